//! Scanner Configuration
//!
//! Tuning parameters and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scanner settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Capture window geometry
    pub roi: RoiConfig,
    /// Stability lock settings
    pub stability: StabilityConfig,
    /// Image enhancement parameters for the decode cascade
    pub enhance: EnhanceConfig,
    /// OCR settings
    pub ocr: OcrConfig,
}

/// Capture window as fractions of the frame, centered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiConfig {
    /// Fraction of the frame height covered by the scan window
    pub height_frac: f32,
    /// Fraction of the frame width covered by the scan window
    pub width_frac: f32,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            height_frac: 0.35,
            width_frac: 0.90,
        }
    }
}

/// Debounce settings for the stability tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Consecutive identical detections required before a code locks
    pub threshold: u32,
    /// Scanning cadence in milliseconds
    pub scan_interval_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            scan_interval_ms: 150,
        }
    }
}

/// Parameters for the image variants the decode cascade tries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// CLAHE clip limit
    pub clahe_clip: f32,
    /// CLAHE tile size in pixels
    pub clahe_tile: u32,
    /// Unsharp mask amount
    pub unsharp_amount: f32,
    /// Unsharp mask Gaussian sigma
    pub unsharp_sigma: f32,
    /// Morphological close kernel width (bridges bar gaps horizontally)
    pub morph_kernel_w: u32,
    /// Morphological close kernel height
    pub morph_kernel_h: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            clahe_clip: 2.0,
            clahe_tile: 8,
            unsharp_amount: 1.4,
            unsharp_sigma: 1.0,
            morph_kernel_w: 21,
            morph_kernel_h: 3,
        }
    }
}

/// Digit OCR settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Run the OCR fallback stage when every barcode stage fails
    pub fallback: bool,
    /// Also scan the lower part of the window for a PIN
    pub read_pin: bool,
    /// Minimum digits for a card number candidate
    pub min_digits: usize,
    /// Maximum digits for a card number candidate
    pub max_digits: usize,
    /// Exact digit count of a PIN token
    pub pin_digits: usize,
    /// Tesseract language for the OCR backend
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            fallback: false,
            read_pin: false,
            min_digits: 10,
            max_digits: 24,
            pin_digits: 4,
            language: "eng".to_string(),
        }
    }
}

/// Get the configuration directory for this application
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "cashea", "VoucherScan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ScannerConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ScannerConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &ScannerConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
