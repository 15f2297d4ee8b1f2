//! Vision Layer
//!
//! Resolves a card/voucher code from a cropped scan window: image variant
//! generation, the cascading barcode/OCR decode, and PIN extraction.

pub mod barcode;
pub mod cascade;
pub mod enhance;
pub mod ocr;
pub mod pin;
pub mod roi;

use std::fmt;

use image::RgbaImage;

pub use cascade::DecodeCascade;
pub use ocr::DigitReader;
pub use roi::{compute_roi, RoiRect};

/// Encoding scheme of a decoded symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbology {
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code128,
    Code39,
    Code93,
    Itf,
    Codabar,
    DataBar,
    DataBarExpanded,
    Qr,
    Pdf417,
    /// Text recognized by the OCR fallback rather than a barcode decoder
    Ocr,
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Code128 => "CODE-128",
            Symbology::Code39 => "CODE-39",
            Symbology::Code93 => "CODE-93",
            Symbology::Itf => "ITF",
            Symbology::Codabar => "CODABAR",
            Symbology::DataBar => "DATABAR",
            Symbology::DataBarExpanded => "DATABAR-EXP",
            Symbology::Qr => "QR",
            Symbology::Pdf417 => "PDF417",
            Symbology::Ocr => "OCR",
        };
        f.write_str(name)
    }
}

/// One decoded code candidate from a single scan window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeCandidate {
    /// Decoded payload, trimmed
    pub text: String,
    /// How the payload was encoded
    pub symbology: Symbology,
    /// Detection outline in crop-local coordinates; empty or at least four
    /// points. Callers offset it into frame coordinates for display.
    pub polygon: Vec<(i32, i32)>,
}

/// Everything one decode pass recovered from a scan window.
#[derive(Debug, Clone, Default)]
pub struct ScanReading {
    /// The card code candidate, if any stage succeeded
    pub card: Option<DecodeCandidate>,
    /// The PIN candidate, when the combined mode is active
    pub pin: Option<String>,
}

/// One full decode pass over a cropped scan window.
///
/// [`DecodeCascade`] is the production implementation; tests drive the scan
/// loop with scripted implementations.
pub trait CropDecoder: Send {
    fn scan(&self, crop: &RgbaImage) -> ScanReading;
}
