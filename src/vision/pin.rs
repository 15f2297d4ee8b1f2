//! PIN extraction
//!
//! Gift cards print a short verification PIN below the barcode. In the
//! combined barcode+PIN mode the lower part of the scan window goes through
//! a denoise + adaptive threshold pass and a digit-only recognizer; the
//! first 4-digit token wins.

use image::{imageops, GrayImage};
use tracing::debug;

use crate::config::OcrConfig;

use super::enhance::adaptive_mean_threshold;
use super::ocr::{card_candidate, find_pin_token, DigitReader};

/// Result of the combined lower-region OCR pass
#[derive(Debug, Clone, Default)]
pub struct PinScan {
    /// The PIN token, when one was recognized
    pub pin: Option<String>,
    /// A card-number candidate recovered from the same pass, used only when
    /// no barcode decoded
    pub card_text: Option<String>,
}

/// Lower sub-region of the scan window where the PIN (and often the printed
/// card number) lives: rows 45%-98%, columns 2%-98%.
pub fn pin_region(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let y0 = (h as f32 * 0.45) as u32;
    let y1 = (h as f32 * 0.98) as u32;
    let x0 = (w as f32 * 0.02) as u32;
    let x1 = (w as f32 * 0.98) as u32;
    if x1 <= x0 || y1 <= y0 {
        return GrayImage::new(0, 0);
    }
    imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Run the combined PIN + printed-card-number scan on a grayscale crop.
pub fn scan_pin_region(
    gray: &GrayImage,
    reader: &dyn DigitReader,
    config: &OcrConfig,
) -> PinScan {
    let region = pin_region(gray);
    if region.width() == 0 || region.height() == 0 {
        return PinScan::default();
    }

    let filtered = imageproc::filter::bilateral_filter(&region, 9, 40.0, 40.0);
    let binary = adaptive_mean_threshold(&filtered, 17, 10);

    let lines = match reader.read_digit_lines(&binary) {
        Ok(lines) => lines,
        Err(e) => {
            debug!("PIN OCR pass failed: {e:#}");
            return PinScan::default();
        }
    };

    let pin = find_pin_token(&lines, config.pin_digits);
    let card_text = card_candidate(&lines, config.min_digits, config.max_digits);
    if let Some(pin) = &pin {
        debug!("PIN candidate: {pin}");
    }

    PinScan { pin, card_text }
}
