//! Decode cascade
//!
//! Given one cropped scan window, runs an ordered list of fallback
//! strategies until one yields a barcode or OCR payload:
//!
//! 1. every image variant, in a fixed order
//! 2. selected variants resampled over a scale ladder
//! 3. binary variants at the four right-angle rotations
//! 4. digit OCR over a transform chain (only when enabled)
//! 5. the whole crop rotated 90° clockwise, through stages 1-3 again
//!
//! Every stage enumerates a fixed finite list, so the cascade always
//! terminates without an internal timeout.

use image::{imageops, DynamicImage, GrayImage, RgbaImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use tracing::debug;

use crate::config::{EnhanceConfig, OcrConfig};

use super::barcode;
use super::enhance::{adaptive_mean_threshold, build_variants, scale_by, Variant};
use super::ocr::{longest_digit_run, DigitReader};
use super::pin::scan_pin_region;
use super::{CropDecoder, DecodeCandidate, ScanReading, Symbology};

/// Variants worth retrying at multiple scales
const SCALE_VARIANTS: [&str; 3] = ["otsu", "sharp", "closed"];
/// Scale ladder for the second pass
const SCALES: [f32; 5] = [0.8, 1.0, 1.2, 1.5, 2.0];
/// Variants worth retrying at right-angle rotations
const ROTATION_VARIANTS: [&str; 2] = ["otsu", "otsu-inv"];

/// The cascading decode pipeline for one scan window.
pub struct DecodeCascade {
    enhance: EnhanceConfig,
    ocr: OcrConfig,
    reader: Option<Box<dyn DigitReader>>,
}

impl DecodeCascade {
    /// Build a cascade with the given enhancement and OCR settings
    pub fn new(enhance: EnhanceConfig, ocr: OcrConfig) -> Self {
        Self {
            enhance,
            ocr,
            reader: None,
        }
    }

    /// Attach a digit recognizer for the OCR fallback and PIN stages
    pub fn with_reader(mut self, reader: Box<dyn DigitReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Resolve the most likely card code in a cropped scan window.
    pub fn decode(&self, crop: &RgbaImage) -> Option<DecodeCandidate> {
        let gray = DynamicImage::ImageRgba8(crop.clone()).to_luma8();
        self.decode_gray(&gray)
    }

    fn decode_gray(&self, gray: &GrayImage) -> Option<DecodeCandidate> {
        if gray.width() == 0 || gray.height() == 0 {
            return None;
        }

        if let Some(candidate) = self.barcode_passes(gray) {
            return Some(candidate);
        }

        if self.ocr.fallback {
            if let Some(candidate) = self.ocr_fallback(gray) {
                return Some(candidate);
            }
        }

        self.rotated_retry(gray)
    }

    /// Stages 1-3: variant loop, scale ladder, rotations.
    fn barcode_passes(&self, gray: &GrayImage) -> Option<DecodeCandidate> {
        let variants = build_variants(gray, &self.enhance);

        for (name, image) in &variants {
            if let Some(candidate) = barcode::decode(image) {
                debug!("cascade: direct hit on variant '{name}'");
                return Some(candidate);
            }
        }

        for name in SCALE_VARIANTS {
            let image = variant(&variants, name);
            for factor in SCALES {
                if let Some(candidate) = barcode::decode(&scale_by(image, factor)) {
                    debug!("cascade: scale hit on '{name}' at {factor}");
                    return Some(candidate);
                }
            }
        }

        for name in ROTATION_VARIANTS {
            let image = variant(&variants, name);
            let rotations: [(u32, GrayImage); 4] = [
                (0, image.clone()),
                (90, imageops::rotate90(image)),
                (180, imageops::rotate180(image)),
                (270, imageops::rotate270(image)),
            ];
            for (angle, rotated) in &rotations {
                if let Some(candidate) = barcode::decode(rotated) {
                    debug!("cascade: rotation hit on '{name}' at {angle}°");
                    return Some(candidate);
                }
            }
        }

        None
    }

    /// Stage 4: digit OCR over a fixed transform chain.
    ///
    /// Crops the lower part of the window (number layouts vary, so the
    /// region is generous), then tries each transform until the recognized
    /// lines contain a digit run of accepted length; the longest run wins.
    fn ocr_fallback(&self, gray: &GrayImage) -> Option<DecodeCandidate> {
        let reader = self.reader.as_deref()?;

        let (w, h) = gray.dimensions();
        let y0 = (h as f32 * 0.30) as u32;
        let y1 = (h as f32 * 0.98) as u32;
        let x0 = (w as f32 * 0.03) as u32;
        let x1 = (w as f32 * 0.97) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let region = imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();

        let transforms: [(&str, fn(&GrayImage) -> GrayImage); 8] = [
            ("identity", |img| img.clone()),
            ("bilateral", |img| {
                imageproc::filter::bilateral_filter(img, 9, 40.0, 40.0)
            }),
            ("gaussian", |img| {
                imageproc::filter::gaussian_blur_f32(img, 1.1)
            }),
            ("adaptive-mean", |img| adaptive_mean_threshold(img, 17, 10)),
            ("adaptive-gaussian", |img| adaptive_mean_threshold(img, 20, 8)),
            ("otsu", |img| {
                let level = otsu_level(img);
                threshold(img, level, ThresholdType::Binary)
            }),
            ("median", |img| imageproc::filter::median_filter(img, 1, 1)),
            ("upscale", |img| scale_by(img, 2.2)),
        ];

        for (name, transform) in transforms {
            let processed = transform(&region);
            let lines = match reader.read_digit_lines(&processed) {
                Ok(lines) => lines,
                Err(e) => {
                    debug!("cascade: OCR transform '{name}' failed: {e:#}");
                    continue;
                }
            };
            if let Some(run) = longest_digit_run(&lines, self.ocr.min_digits, self.ocr.max_digits)
            {
                debug!("cascade: OCR hit after transform '{name}' ({} digits)", run.len());
                return Some(DecodeCandidate {
                    text: run,
                    symbology: Symbology::Ocr,
                    polygon: full_rect(w, h),
                });
            }
        }

        None
    }

    /// Stage 5: the whole crop rotated 90° clockwise.
    ///
    /// Polygon points come back in rotated coordinates and are mapped into
    /// the unrotated frame via `(x, y) = (p.y, rotated_width - 1 - p.x)`.
    fn rotated_retry(&self, gray: &GrayImage) -> Option<DecodeCandidate> {
        let rotated = imageops::rotate90(gray);
        let mut candidate = self.barcode_passes(&rotated)?;
        debug!("cascade: hit on 90° rotated crop");

        let rotated_w = rotated.width() as i32;
        candidate.polygon = candidate
            .polygon
            .iter()
            .map(|&(x, y)| (y, rotated_w - 1 - x))
            .collect();
        Some(candidate)
    }
}

impl CropDecoder for DecodeCascade {
    fn scan(&self, crop: &RgbaImage) -> ScanReading {
        let gray = DynamicImage::ImageRgba8(crop.clone()).to_luma8();
        let mut card = self.decode_gray(&gray);
        let mut pin = None;

        if self.ocr.read_pin {
            if let Some(reader) = self.reader.as_deref() {
                let lower = scan_pin_region(&gray, reader, &self.ocr);
                pin = lower.pin;
                // A decoded barcode always outranks the printed number.
                if card.is_none() {
                    card = lower.card_text.map(|text| DecodeCandidate {
                        text,
                        symbology: Symbology::Ocr,
                        polygon: full_rect(gray.width(), gray.height()),
                    });
                }
            }
        }

        ScanReading { card, pin }
    }
}

fn variant<'a>(variants: &'a [Variant], name: &str) -> &'a GrayImage {
    variants
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, image)| image)
        .expect("variant list is fixed")
}

fn full_rect(w: u32, h: u32) -> Vec<(i32, i32)> {
    let (w, h) = (w as i32, h as i32);
    vec![(0, 0), (w, 0), (w, h), (0, h)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use image::{Luma, Rgba};
    use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

    fn cascade() -> DecodeCascade {
        DecodeCascade::new(EnhanceConfig::default(), OcrConfig::default())
    }

    fn blank_crop(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    /// Render a barcode into an RGBA crop with a quiet border.
    fn barcode_crop(contents: &str, format: BarcodeFormat, width: i32, height: i32) -> RgbaImage {
        let matrix = MultiFormatWriter
            .encode(contents, &format, width, height)
            .expect("encode test barcode");

        let border = 16u32;
        let (mw, mh) = (matrix.getWidth(), matrix.getHeight());
        RgbaImage::from_fn(mw + 2 * border, mh + 2 * border, |x, y| {
            let inside = x >= border && y >= border && x < mw + border && y < mh + border;
            if inside && matrix.get(x - border, y - border) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    struct ScriptedReader {
        lines: Vec<String>,
    }

    impl DigitReader for ScriptedReader {
        fn read_digit_lines(&self, _image: &GrayImage) -> Result<Vec<String>> {
            Ok(self.lines.clone())
        }
    }

    #[test]
    fn test_blank_crop_yields_none() {
        assert!(cascade().decode(&blank_crop(200, 100)).is_none());
    }

    #[test]
    fn test_empty_crop_yields_none() {
        assert!(cascade().decode(&RgbaImage::new(0, 0)).is_none());
    }

    #[test]
    fn test_decodes_code128() {
        let crop = barcode_crop("1234567890123", BarcodeFormat::CODE_128, 320, 120);
        let candidate = cascade().decode(&crop).expect("cascade should decode");
        assert_eq!(candidate.text, "1234567890123");
        assert_eq!(candidate.symbology, Symbology::Code128);
    }

    #[test]
    fn test_decodes_qr() {
        let crop = barcode_crop("12345678901234567890", BarcodeFormat::QR_CODE, 160, 160);
        let candidate = cascade().decode(&crop).expect("cascade should decode");
        assert_eq!(candidate.text, "12345678901234567890");
        assert_eq!(candidate.symbology, Symbology::Qr);
    }

    #[test]
    fn test_decodes_rotated_crop() {
        // A barcode lying on its side only decodes through a rotation stage.
        let upright = barcode_crop("4049337123456", BarcodeFormat::CODE_128, 320, 120);
        let rotated = image::imageops::rotate270(&upright);
        let candidate = cascade().decode(&rotated).expect("rotated decode");
        assert_eq!(candidate.text, "4049337123456");
    }

    #[test]
    fn test_ocr_fallback_disabled_without_flag() {
        let reader = ScriptedReader {
            lines: vec!["1234567890123".to_string()],
        };
        let cascade = cascade().with_reader(Box::new(reader));
        // Blank crop, no barcode; fallback flag off, so no candidate.
        assert!(cascade.decode(&blank_crop(200, 100)).is_none());
    }

    #[test]
    fn test_ocr_fallback_finds_digit_run() {
        let reader = ScriptedReader {
            lines: vec!["card".to_string(), "1234567890123".to_string()],
        };
        let ocr = OcrConfig {
            fallback: true,
            ..OcrConfig::default()
        };
        let cascade =
            DecodeCascade::new(EnhanceConfig::default(), ocr).with_reader(Box::new(reader));

        let candidate = cascade.decode(&blank_crop(200, 100)).expect("OCR fallback");
        assert_eq!(candidate.text, "1234567890123");
        assert_eq!(candidate.symbology, Symbology::Ocr);
        assert_eq!(candidate.polygon.len(), 4);
    }

    #[test]
    fn test_ocr_fallback_rejects_short_runs() {
        let reader = ScriptedReader {
            lines: vec!["1234".to_string()],
        };
        let ocr = OcrConfig {
            fallback: true,
            ..OcrConfig::default()
        };
        let cascade =
            DecodeCascade::new(EnhanceConfig::default(), ocr).with_reader(Box::new(reader));
        assert!(cascade.decode(&blank_crop(200, 100)).is_none());
    }

    #[test]
    fn test_scan_combined_mode_reads_pin() {
        let reader = ScriptedReader {
            lines: vec!["12345678901234567890".to_string(), "4711".to_string()],
        };
        let ocr = OcrConfig {
            read_pin: true,
            ..OcrConfig::default()
        };
        let cascade =
            DecodeCascade::new(EnhanceConfig::default(), ocr).with_reader(Box::new(reader));

        let reading = cascade.scan(&blank_crop(200, 200));
        assert_eq!(reading.pin.as_deref(), Some("4711"));
        // No barcode decoded, so the printed number stands in.
        let card = reading.card.expect("printed card number");
        assert_eq!(card.text, "12345678901234567890");
        assert_eq!(card.symbology, Symbology::Ocr);
    }

    #[test]
    fn test_scan_barcode_outranks_printed_number() {
        let reader = ScriptedReader {
            lines: vec!["99999999999999999999".to_string()],
        };
        let ocr = OcrConfig {
            read_pin: true,
            ..OcrConfig::default()
        };
        let cascade =
            DecodeCascade::new(EnhanceConfig::default(), ocr).with_reader(Box::new(reader));

        let crop = barcode_crop("1234567890123", BarcodeFormat::CODE_128, 320, 120);
        let reading = cascade.scan(&crop);
        assert_eq!(reading.card.expect("barcode").text, "1234567890123");
    }

    #[test]
    fn test_polygon_remap_formula() {
        // A point at (x, y) in a 90° clockwise rotated image maps back to
        // (y, rotated_width - 1 - x) in the original.
        let mut gray = GrayImage::from_pixel(4, 6, Luma([255]));
        gray.put_pixel(1, 2, Luma([0]));
        let rotated = image::imageops::rotate90(&gray);
        // rotate90: (x, y) -> (height - 1 - y, x); original (1,2) lands at (3,1)
        assert_eq!(rotated.get_pixel(3, 1).0[0], 0);
        let rotated_w = rotated.width() as i32;
        let (bx, by) = (1i32, rotated_w - 1 - 3);
        assert_eq!((bx, by), (1, 2));
    }
}
