//! Stability tracking
//!
//! Per-frame detections are noisy: a blurry frame can misread a digit, and
//! a half-occluded barcode can decode to garbage. The tracker only promotes
//! a candidate to a locked result after it has been seen unchanged for a
//! configured number of consecutive cycles.
//!
//! The tracker is a plain value advanced by a pure step function, so the
//! debounce logic tests without any camera or UI in the loop.

use crate::vision::{DecodeCandidate, Symbology};

use super::shops::{digits_of, trim_dual_encoding};

/// Cross-cycle debounce state. One instance lives for the duration of a
/// scan session; everything else is recomputed per cycle.
#[derive(Debug, Clone, Default)]
pub struct StabilityState {
    potential_text: String,
    potential_symbology: Option<Symbology>,
    potential_count: u32,
    locked_text: String,
    potential_pin: String,
    potential_pin_count: u32,
    locked_pin: String,
}

/// Where the tracker stands after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// No candidate is being tracked
    Idle,
    /// A candidate has been seen `count` consecutive times
    Tracking { count: u32, threshold: u32 },
    /// The tracked candidate reached the threshold this cycle
    Locked,
}

/// A code promoted to a confirmed result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedCode {
    /// Digits-only card code, with the dual-encoding trim applied
    pub digits: String,
    /// Digit count before the trim; the classifier works on this
    pub raw_digit_count: usize,
    /// Symbology of the locked detection
    pub symbology: Option<Symbology>,
    /// The locked PIN, when one has stabilized
    pub pin: Option<String>,
}

/// Result of advancing the tracker by one cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub status: TrackStatus,
    /// `Some` exactly when this cycle locked a code that differs from the
    /// previous lock; re-locking the same text is idempotent.
    pub new_lock: Option<LockedCode>,
}

impl StabilityState {
    /// Feed one cycle's candidate (and PIN candidate) into the tracker.
    ///
    /// Matching text increments the counter; differing text restarts it at
    /// 1 with the new value; no candidate clears tracking entirely. The
    /// PIN follows the same discipline on its own counter and locks
    /// independently of the code.
    pub fn advance(
        &mut self,
        candidate: Option<&DecodeCandidate>,
        pin: Option<&str>,
        threshold: u32,
    ) -> CycleOutcome {
        match candidate {
            Some(c) if !c.text.is_empty() => {
                if c.text == self.potential_text {
                    self.potential_count += 1;
                } else {
                    self.potential_text = c.text.clone();
                    self.potential_symbology = Some(c.symbology);
                    self.potential_count = 1;
                }
            }
            _ => {
                self.potential_text.clear();
                self.potential_symbology = None;
                self.potential_count = 0;
            }
        }

        match pin {
            Some(p) if !p.is_empty() => {
                if p == self.potential_pin {
                    self.potential_pin_count += 1;
                } else {
                    self.potential_pin = p.to_string();
                    self.potential_pin_count = 1;
                }
            }
            _ => {
                self.potential_pin.clear();
                self.potential_pin_count = 0;
            }
        }

        if self.potential_pin_count >= threshold {
            self.locked_pin = self.potential_pin.clone();
        }

        let mut new_lock = None;
        let status = if self.potential_count >= threshold {
            let is_new = self.potential_text != self.locked_text;
            self.locked_text = self.potential_text.clone();

            if is_new {
                let raw_digits = digits_of(&self.locked_text);
                new_lock = Some(LockedCode {
                    raw_digit_count: raw_digits.len(),
                    digits: trim_dual_encoding(&raw_digits),
                    symbology: self.potential_symbology,
                    pin: self.pin(),
                });
            }
            TrackStatus::Locked
        } else if self.potential_count > 0 {
            TrackStatus::Tracking {
                count: self.potential_count,
                threshold,
            }
        } else {
            TrackStatus::Idle
        };

        CycleOutcome { status, new_lock }
    }

    /// Discard all tracking progress and locked values (new-scan request)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether a code has locked in this session
    pub fn is_locked(&self) -> bool {
        !self.locked_text.is_empty()
    }

    /// Digits-only locked code with the dual-encoding trim applied
    pub fn locked_digits(&self) -> Option<String> {
        if self.locked_text.is_empty() {
            None
        } else {
            Some(trim_dual_encoding(&digits_of(&self.locked_text)))
        }
    }

    /// The locked PIN, if one has stabilized
    pub fn pin(&self) -> Option<String> {
        if self.locked_pin.is_empty() {
            None
        } else {
            Some(self.locked_pin.clone())
        }
    }

    /// Text currently being tracked toward a lock
    pub fn potential_text(&self) -> &str {
        &self.potential_text
    }

    /// Symbology of the tracked candidate
    pub fn potential_symbology(&self) -> Option<Symbology> {
        self.potential_symbology
    }

    /// Consecutive sightings of the tracked candidate
    pub fn potential_count(&self) -> u32 {
        self.potential_count
    }

    /// PIN currently being tracked
    pub fn potential_pin(&self) -> &str {
        &self.potential_pin
    }
}
