//! voucher-scan - gift-card code scanner
//!
//! Reads a retailer gift-card's number (and optional PIN) from a photo or
//! a sequence of frames, stabilizes the detection over time, and works out
//! which shop issued the card from the digit count.

mod analysis;
mod capture;
mod config;
mod scanner;
mod vision;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::shops::{registry, validate_for_shop, Classification, Shop};
use crate::analysis::ScanEvent;
use crate::capture::{FrameSource, ImageSequence, StillImage};
use crate::config::ScannerConfig;
use crate::scanner::Scanner;
use crate::vision::DecodeCascade;

/// voucher-scan - gift-card barcode/OCR scanner
#[derive(Parser, Debug)]
#[command(name = "voucher-scan")]
#[command(about = "Scan gift-card barcodes and classify the issuing shop")]
struct Args {
    /// Scan a single photo and exit
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Replay a directory of frames as a continuous feed
    #[arg(short, long, value_name = "DIR")]
    frames: Option<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the stability threshold
    #[arg(long)]
    threshold: Option<u32>,

    /// Enable the OCR fallback stage of the decode cascade
    #[arg(long)]
    ocr_fallback: bool,

    /// Also scan the lower part of the window for a PIN
    #[arg(long)]
    pin: bool,

    /// List the supported shops and exit
    #[arg(long)]
    list_shops: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if args.list_shops {
        println!("Supported shops:");
        for profile in registry() {
            println!(
                "  {:5}  card lengths {:?}, accepted on submit {:?}",
                profile.shop.name(),
                profile.detect_lengths,
                profile.accepted_lengths
            );
        }
        return Ok(());
    }

    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(threshold) = args.threshold {
        config.stability.threshold = threshold.max(1);
    }
    if args.ocr_fallback {
        config.ocr.fallback = true;
    }
    if args.pin {
        config.ocr.read_pin = true;
    }

    let decoder = build_cascade(&config)?;

    if let Some(path) = args.image {
        scan_single_photo(&path, decoder, config)
    } else if let Some(dir) = args.frames {
        scan_frame_sequence(&dir, decoder, config)
    } else {
        anyhow::bail!("nothing to scan: pass --image <PATH> or --frames <DIR>")
    }
}

/// Load configuration from an explicit path or the user config dir
fn load_or_create_config(explicit: Option<&Path>) -> Result<ScannerConfig> {
    if let Some(path) = explicit {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
        }
    }
    info!("Using default configuration");
    Ok(ScannerConfig::default())
}

/// Build the decode cascade, attaching the OCR backend when needed
fn build_cascade(config: &ScannerConfig) -> Result<DecodeCascade> {
    let cascade = DecodeCascade::new(config.enhance.clone(), config.ocr.clone());
    if !(config.ocr.fallback || config.ocr.read_pin) {
        return Ok(cascade);
    }

    #[cfg(feature = "tesseract-ocr")]
    {
        let reader = vision::ocr::TesseractReader::new(&config.ocr.language)?;
        info!("tesseract OCR backend ready ({})", config.ocr.language);
        Ok(cascade.with_reader(Box::new(reader)))
    }

    #[cfg(not(feature = "tesseract-ocr"))]
    {
        tracing::warn!(
            "OCR stages requested, but this build lacks the tesseract-ocr feature; \
             barcode stages only"
        );
        Ok(cascade)
    }
}

/// One-shot mode: scan a frozen photo on a background worker
fn scan_single_photo(path: &Path, decoder: DecodeCascade, config: ScannerConfig) -> Result<()> {
    let mut source = StillImage::open(path)?;
    let frame = source
        .next_frame()?
        .context("still image source yielded no frame")?;
    info!(
        "scanning photo {} ({}x{})",
        path.display(),
        frame.width,
        frame.height
    );

    let receiver = scanner::scan_photo_background(frame, decoder, config);
    let result = receiver.recv().context("scan worker vanished")?;

    let Some(card) = &result.card else {
        anyhow::bail!("no barcode or code found in picture");
    };

    println!("code:  {} ({})", card.text, card.symbology);
    if let Some(digits) = &result.digits {
        println!("card:  {digits}");
    }
    if let Some(pin) = &result.pin {
        println!("pin:   {pin}");
    }
    if let Some(classification) = &result.classification {
        println!("shop:  {}", describe(classification));
        if let (Classification::Unambiguous(shop), Some(digits)) =
            (classification, &result.digits)
        {
            print_submit_value(*shop, digits);
        }
    }
    Ok(())
}

/// Run the shop's digit-count validation and show what would be submitted
fn print_submit_value(shop: Shop, digits: &str) {
    match validate_for_shop(shop, digits) {
        Ok(corrected) => println!("submit: {corrected}"),
        Err(e) => println!("submit: rejected ({e})"),
    }
}

/// Continuous mode: replay frames through the stability tracker
fn scan_frame_sequence(dir: &Path, decoder: DecodeCascade, config: ScannerConfig) -> Result<()> {
    let source = ImageSequence::from_dir(dir)?;
    info!("replaying {} frames from {}", source.len(), dir.display());

    let (mut scanner, events) = Scanner::new(source, decoder, config);

    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            match event {
                ScanEvent::Cycle { status, .. } => debug!("{status}"),
                ScanEvent::Locked {
                    digits,
                    symbology,
                    pin,
                    classification,
                } => {
                    match symbology {
                        Some(symbology) => println!("locked: {digits} ({symbology})"),
                        None => println!("locked: {digits}"),
                    }
                    if let Some(pin) = pin {
                        println!("pin:    {pin}");
                    }
                    println!("shop:   {}", describe(&classification));
                }
                ScanEvent::CardReady { shop, digits, pin } => {
                    match pin {
                        Some(pin) => println!("ready:  {shop} {digits} PIN {pin}"),
                        None => println!("ready:  {shop} {digits}"),
                    }
                    print_submit_value(shop, &digits);
                }
            }
        }
    });

    scanner.run(&AtomicBool::new(false));
    drop(scanner);
    printer.join().ok();
    Ok(())
}

fn describe(classification: &Classification) -> String {
    match classification {
        Classification::Unambiguous(shop) => shop.to_string(),
        Classification::Ambiguous(shops) => {
            let names: Vec<&str> = shops.iter().map(|s| s.name()).collect();
            format!("ambiguous ({}) - choose manually", names.join(" or "))
        }
        Classification::NoMatch { digit_count } => {
            format!("no match for {digit_count} digits - try again")
        }
    }
}
