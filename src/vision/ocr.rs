//! Digit-only text recognition
//!
//! The cascade's OCR fallback and the PIN extractor both go through the
//! [`DigitReader`] trait, so the native tesseract backend stays swappable
//! (and the decode logic testable with a scripted reader).

use anyhow::Result;
use image::GrayImage;

/// A text recognizer restricted to the digits 0-9.
///
/// Implementations return the recognized lines top to bottom; tokens inside
/// a line keep their whitespace separation.
pub trait DigitReader: Send + Sync {
    /// Recognize digit text in a preprocessed grayscale image
    fn read_digit_lines(&self, image: &GrayImage) -> Result<Vec<String>>;
}

/// Longest per-line digit run within `[min, max]` digits.
///
/// Each line collapses to its digit characters; lines whose run falls
/// outside the accepted range are ignored.
pub fn longest_digit_run(lines: &[String], min: usize, max: usize) -> Option<String> {
    lines
        .iter()
        .map(|line| line.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .filter(|run| run.len() >= min && run.len() <= max)
        .max_by_key(|run| run.len())
}

/// First whitespace-delimited token consisting of exactly `pin_len` digits
pub fn find_pin_token(lines: &[String], pin_len: usize) -> Option<String> {
    for line in lines {
        if let Some(token) = line
            .split_whitespace()
            .find(|t| t.len() == pin_len && t.chars().all(|c| c.is_ascii_digit()))
        {
            return Some(token.to_string());
        }
    }
    None
}

/// Card-number candidate from a combined barcode+PIN OCR pass.
///
/// Prefers single tokens of at least `min` digits; when the number is
/// printed across several lines, the per-line digit runs are joined and
/// accepted if the joined length lands within `[min, max]`.
pub fn card_candidate(lines: &[String], min: usize, max: usize) -> Option<String> {
    let tokens: Vec<String> = lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .filter(|t| t.len() >= min && t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| t.to_string())
        .collect();

    if let Some(best) = tokens.iter().max_by_key(|t| t.len()) {
        return Some(best.clone());
    }

    // Join adjacent numeric lines.
    let numeric_lines: Vec<String> = lines
        .iter()
        .map(|line| line.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .filter(|run| !run.is_empty())
        .collect();
    if numeric_lines.len() >= 2 {
        let joined: String = numeric_lines.concat();
        if joined.len() >= min && joined.len() <= max {
            return Some(joined);
        }
    }

    None
}

#[cfg(feature = "tesseract-ocr")]
pub use tesseract::TesseractReader;

#[cfg(feature = "tesseract-ocr")]
mod tesseract {
    use std::io::Cursor;

    use anyhow::{Context, Result};
    use image::{DynamicImage, GrayImage, ImageFormat};
    use leptess::{LepTess, Variable};
    use parking_lot::Mutex;
    use tracing::debug;

    use super::DigitReader;

    /// Digit OCR backed by a system tesseract install via leptess
    pub struct TesseractReader {
        // LepTess is not Sync; the reader is shared across the scan loop
        // and the one-shot worker.
        engine: Mutex<LepTess>,
    }

    impl TesseractReader {
        /// Initialize tesseract for digit-only recognition
        pub fn new(language: &str) -> Result<Self> {
            let mut engine = LepTess::new(None, language)
                .with_context(|| format!("Failed to initialize tesseract ({language})"))?;
            engine
                .set_variable(Variable::TesseditCharWhitelist, "0123456789")
                .context("Failed to set tesseract digit whitelist")?;
            // PSM 6: assume a uniform block of text.
            engine
                .set_variable(Variable::TesseditPagesegMode, "6")
                .context("Failed to set tesseract page segmentation mode")?;
            Ok(Self {
                engine: Mutex::new(engine),
            })
        }
    }

    impl DigitReader for TesseractReader {
        fn read_digit_lines(&self, image: &GrayImage) -> Result<Vec<String>> {
            let mut png = Vec::new();
            DynamicImage::ImageLuma8(image.clone())
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .context("Failed to encode OCR input")?;

            let mut engine = self.engine.lock();
            engine
                .set_image_from_mem(&png)
                .context("Failed to load OCR input")?;
            let text = engine.get_utf8_text().context("OCR recognition failed")?;

            let lines: Vec<String> = text
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect();
            debug!("tesseract produced {} line(s)", lines.len());
            Ok(lines)
        }
    }
}
