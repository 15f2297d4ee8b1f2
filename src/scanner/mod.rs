//! Scan Loop
//!
//! Drives one recognition cycle per tick: acquire frame, crop the scan
//! window, run the decode cascade, advance the stability tracker, classify
//! on a fresh lock. Exactly one cycle is in flight at a time, so the
//! tracker needs no locking; consumers listen on an event channel and any
//! work they trigger runs off the scanning thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::analysis::events::{status_line, ScanEvent};
use crate::analysis::shops::{classify, digits_of, trim_dual_encoding, Classification};
use crate::analysis::stability::StabilityState;
use crate::capture::{Frame, FrameSource};
use crate::config::ScannerConfig;
use crate::vision::{compute_roi, CropDecoder, DecodeCandidate, RoiRect};

/// Continuous scanner: a frame source, a decode pipeline, and the one
/// long-lived piece of state between them.
pub struct Scanner<S, D> {
    source: S,
    decoder: D,
    config: ScannerConfig,
    state: StabilityState,
    events: Sender<ScanEvent>,
}

impl<S: FrameSource, D: CropDecoder> Scanner<S, D> {
    /// Create a scanner and the receiving end of its event stream
    pub fn new(source: S, decoder: D, config: ScannerConfig) -> (Self, Receiver<ScanEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        (
            Self {
                source,
                decoder,
                config,
                state: StabilityState::default(),
                events,
            },
            receiver,
        )
    }

    /// Run one scan cycle.
    ///
    /// Returns `false` once the frame source is exhausted. Acquisition
    /// failures skip the cycle and keep the loop alive.
    pub fn tick(&mut self) -> bool {
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return false,
            Err(e) => {
                warn!("frame acquisition failed, skipping cycle: {e:#}");
                return true;
            }
        };

        let roi = compute_roi(frame.width, frame.height, &self.config.roi);
        let crop = frame.crop(&roi);
        let reading = self.decoder.scan(&crop);

        let threshold = self.config.stability.threshold;
        let outcome = self
            .state
            .advance(reading.card.as_ref(), reading.pin.as_deref(), threshold);

        let polygon = reading.card.as_ref().and_then(|candidate| {
            (candidate.polygon.len() >= 4).then(|| offset_polygon(&candidate.polygon, &roi))
        });
        let _ = self.events.send(ScanEvent::Cycle {
            roi,
            polygon,
            status: status_line(&self.state, threshold),
        });

        if let Some(lock) = outcome.new_lock {
            let classification = classify(lock.raw_digit_count);
            match &classification {
                Classification::Unambiguous(shop) => {
                    info!("locked {} ({} digits) -> {shop}", lock.digits, lock.digits.len());
                }
                Classification::Ambiguous(shops) => {
                    info!(
                        "locked {} ({} digits) -> ambiguous {shops:?}",
                        lock.digits,
                        lock.digits.len()
                    );
                }
                Classification::NoMatch { digit_count } => {
                    info!("locked code matches no shop ({digit_count} digits)");
                }
            }

            let _ = self.events.send(ScanEvent::Locked {
                digits: lock.digits.clone(),
                symbology: lock.symbology,
                pin: lock.pin.clone(),
                classification: classification.clone(),
            });
            if let Classification::Unambiguous(shop) = classification {
                let _ = self.events.send(ScanEvent::CardReady {
                    shop,
                    digits: lock.digits,
                    pin: lock.pin,
                });
            }
        } else {
            debug!("cycle complete: {:?}", outcome.status);
        }

        true
    }

    /// Run cycles at the configured cadence until the stop flag is set or
    /// the frame source is exhausted.
    pub fn run(&mut self, stop: &AtomicBool) {
        let interval = Duration::from_millis(self.config.stability.scan_interval_ms);
        info!(
            "scan loop started ({} ms cadence, threshold {})",
            self.config.stability.scan_interval_ms, self.config.stability.threshold
        );

        while !stop.load(Ordering::Relaxed) {
            if !self.tick() {
                info!("frame source exhausted, scan loop finished");
                break;
            }
            std::thread::sleep(interval);
        }
    }

    /// Restart detection: discard tracking progress and locked values
    pub fn reset(&mut self) {
        self.state.reset();
        info!("scan state reset");
    }

    /// Inspect the tracker (status display, tests)
    pub fn state(&self) -> &StabilityState {
        &self.state
    }
}

/// Translate a crop-local polygon into frame coordinates
pub fn offset_polygon(polygon: &[(i32, i32)], roi: &RoiRect) -> Vec<(i32, i32)> {
    polygon
        .iter()
        .map(|&(x, y)| (x + roi.x0, y + roi.y0))
        .collect()
}

/// Result of scanning one frozen photo
#[derive(Debug, Clone)]
pub struct PhotoScan {
    /// The scan window used
    pub roi: RoiRect,
    /// The decoded candidate, polygon already in frame coordinates
    pub card: Option<DecodeCandidate>,
    /// Digits-only card code with the dual-encoding trim applied
    pub digits: Option<String>,
    /// PIN recognized alongside the code, if any
    pub pin: Option<String>,
    /// Shop classification of the raw digit count
    pub classification: Option<Classification>,
}

/// Scan a single frozen photo, no stability tracking.
pub fn scan_photo<D: CropDecoder>(
    frame: &Frame,
    decoder: &D,
    config: &ScannerConfig,
) -> PhotoScan {
    let roi = compute_roi(frame.width, frame.height, &config.roi);
    let crop = frame.crop(&roi);
    let mut reading = decoder.scan(&crop);

    if let Some(card) = reading.card.as_mut() {
        card.polygon = offset_polygon(&card.polygon, &roi);
    }

    let raw_digits = reading.card.as_ref().map(|c| digits_of(&c.text));
    let classification = raw_digits.as_ref().map(|d| classify(d.len()));
    let digits = raw_digits.as_deref().map(trim_dual_encoding);

    PhotoScan {
        roi,
        card: reading.card,
        digits,
        pin: reading.pin,
        classification,
    }
}

/// Scan a frozen photo on a background worker so the interactive surface
/// is not blocked; the result arrives on the returned channel.
pub fn scan_photo_background<D>(
    frame: Frame,
    decoder: D,
    config: ScannerConfig,
) -> Receiver<PhotoScan>
where
    D: CropDecoder + 'static,
{
    let (sender, receiver) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let result = scan_photo(&frame, &decoder, &config);
        let _ = sender.send(result);
    });
    receiver
}
