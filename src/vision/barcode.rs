//! Barcode decoding via rxing
//!
//! Wraps the multi-format reader with the symbology allow-list used for
//! retail gift cards: the common linear codes plus QR and PDF417.

use std::collections::HashSet;

use image::GrayImage;
use rxing::{
    common::GlobalHistogramBinarizer, BarcodeFormat, BinaryBitmap, DecodeHintType,
    DecodeHintValue, DecodingHintDictionary, Luma8LuminanceSource, MultiUseMultiFormatReader,
    Reader,
};
use tracing::debug;

use super::{DecodeCandidate, Symbology};

/// Formats attempted by every decode pass
fn allowed_formats() -> HashSet<BarcodeFormat> {
    HashSet::from([
        BarcodeFormat::EAN_13,
        BarcodeFormat::EAN_8,
        BarcodeFormat::UPC_A,
        BarcodeFormat::UPC_E,
        BarcodeFormat::CODE_128,
        BarcodeFormat::CODE_39,
        BarcodeFormat::CODE_93,
        BarcodeFormat::ITF,
        BarcodeFormat::CODABAR,
        BarcodeFormat::RSS_14,
        BarcodeFormat::RSS_EXPANDED,
        BarcodeFormat::QR_CODE,
        BarcodeFormat::PDF_417,
    ])
}

fn symbology_of(format: &BarcodeFormat) -> Option<Symbology> {
    match format {
        BarcodeFormat::EAN_13 => Some(Symbology::Ean13),
        BarcodeFormat::EAN_8 => Some(Symbology::Ean8),
        BarcodeFormat::UPC_A => Some(Symbology::UpcA),
        BarcodeFormat::UPC_E => Some(Symbology::UpcE),
        BarcodeFormat::CODE_128 => Some(Symbology::Code128),
        BarcodeFormat::CODE_39 => Some(Symbology::Code39),
        BarcodeFormat::CODE_93 => Some(Symbology::Code93),
        BarcodeFormat::ITF => Some(Symbology::Itf),
        BarcodeFormat::CODABAR => Some(Symbology::Codabar),
        BarcodeFormat::RSS_14 => Some(Symbology::DataBar),
        BarcodeFormat::RSS_EXPANDED => Some(Symbology::DataBarExpanded),
        BarcodeFormat::QR_CODE => Some(Symbology::Qr),
        BarcodeFormat::PDF_417 => Some(Symbology::Pdf417),
        _ => None,
    }
}

/// Attempt a single barcode decode on a grayscale image.
///
/// Returns the first symbol the reader finds, with trimmed payload text and
/// the detection polygon in image-local coordinates.
pub fn decode(image: &GrayImage) -> Option<DecodeCandidate> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }

    let mut hints = DecodingHintDictionary::new();
    hints.insert(
        DecodeHintType::POSSIBLE_FORMATS,
        DecodeHintValue::PossibleFormats(allowed_formats()),
    );
    hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));

    let source =
        Luma8LuminanceSource::new(image.as_raw().clone(), image.width(), image.height());
    let mut bitmap = BinaryBitmap::new(GlobalHistogramBinarizer::new(source));

    let mut reader = MultiUseMultiFormatReader::default();
    let result = match reader.decode_with_hints(&mut bitmap, &hints) {
        Ok(result) => result,
        Err(_) => return None,
    };

    let symbology = symbology_of(result.getBarcodeFormat())?;

    // Linear decodes report only their two scan-line endpoints; overlays
    // draw quadrilaterals, so anything under four points degrades to "no
    // outline" rather than a bogus shape.
    let points = result.getRXingResultPoints();
    let polygon: Vec<(i32, i32)> = if points.len() >= 4 {
        points
            .iter()
            .map(|p| (p.x.round() as i32, p.y.round() as i32))
            .collect()
    } else {
        Vec::new()
    };

    let text = result.getText().trim().to_string();
    debug!("barcode decode hit: {} ({})", text, symbology);

    Some(DecodeCandidate {
        text,
        symbology,
        polygon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use rxing::{MultiFormatWriter, Writer};

    fn rendered(contents: &str, format: BarcodeFormat, width: i32, height: i32) -> GrayImage {
        let matrix = MultiFormatWriter
            .encode(contents, &format, width, height)
            .expect("encode test barcode");

        let border = 16u32;
        let (mw, mh) = (matrix.getWidth(), matrix.getHeight());
        GrayImage::from_fn(mw + 2 * border, mh + 2 * border, |x, y| {
            let inside = x >= border && y >= border && x < mw + border && y < mh + border;
            if inside && matrix.get(x - border, y - border) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_code128_roundtrip() {
        let image = rendered("40493371234567", BarcodeFormat::CODE_128, 320, 120);
        let candidate = decode(&image).expect("decode rendered code128");
        assert_eq!(candidate.text, "40493371234567");
        assert_eq!(candidate.symbology, Symbology::Code128);
    }

    #[test]
    fn test_qr_roundtrip() {
        let image = rendered("1234567890123", BarcodeFormat::QR_CODE, 160, 160);
        let candidate = decode(&image).expect("decode rendered QR");
        assert_eq!(candidate.text, "1234567890123");
        assert_eq!(candidate.symbology, Symbology::Qr);
    }

    #[test]
    fn test_polygon_is_empty_or_quad() {
        for (contents, format, w, h) in [
            ("40493371234567", BarcodeFormat::CODE_128, 320, 120),
            ("1234567890123", BarcodeFormat::QR_CODE, 160, 160),
        ] {
            let image = rendered(contents, format, w, h);
            let candidate = decode(&image).expect("decode");
            assert!(
                candidate.polygon.is_empty() || candidate.polygon.len() >= 4,
                "polygon must be empty or a quad, got {} points",
                candidate.polygon.len()
            );
        }
    }

    #[test]
    fn test_decode_blank_image_yields_none() {
        let blank = GrayImage::from_pixel(64, 64, Luma([255]));
        assert!(decode(&blank).is_none());
    }

    #[test]
    fn test_decode_empty_image_yields_none() {
        let empty = GrayImage::new(0, 0);
        assert!(decode(&empty).is_none());
    }

    #[test]
    fn test_noise_image_yields_none() {
        // Deterministic pseudo-noise; nothing resembling a symbology.
        let noise = GrayImage::from_fn(48, 48, |x, y| {
            Luma([((x * 31 + y * 17) % 251) as u8])
        });
        assert!(decode(&noise).is_none());
    }
}
