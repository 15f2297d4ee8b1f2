//! Scan events
//!
//! What the scan loop reports to the outside world: per-cycle overlay
//! updates, lock events with their classification, and ready-to-use card
//! data once a shop is resolved.

use crate::vision::{RoiRect, Symbology};

use super::shops::{Classification, Shop};
use super::stability::StabilityState;

/// Events emitted by the scan loop, one channel for all consumers
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Advisory per-cycle update for an overlay/UI
    Cycle {
        /// The scan window for this cycle
        roi: RoiRect,
        /// Detection outline in frame coordinates, when a candidate was
        /// found and reported at least four points
        polygon: Option<Vec<(i32, i32)>>,
        /// Human-readable scan status
        status: String,
    },
    /// A new code locked this cycle
    Locked {
        digits: String,
        symbology: Option<Symbology>,
        pin: Option<String>,
        classification: Classification,
    },
    /// A new lock classified unambiguously; everything a downstream
    /// automation consumer needs
    CardReady {
        shop: Shop,
        digits: String,
        pin: Option<String>,
    },
}

/// Render the tracker state as a one-line status for the overlay.
pub fn status_line(state: &StabilityState, threshold: u32) -> String {
    let mut line = if state.potential_count() >= threshold && state.is_locked() {
        let digits = state.locked_digits().unwrap_or_default();
        match state.potential_symbology() {
            Some(symbology) => format!("Locked: {symbology}: {digits}"),
            None => format!("Locked: {digits}"),
        }
    } else if state.potential_count() > 0 {
        format!(
            "Tracking ({}/{}): {}",
            state.potential_count(),
            threshold,
            state.potential_text()
        )
    } else if state.is_locked() {
        format!("Locked: {}", state.locked_digits().unwrap_or_default())
    } else {
        return "Scanning...".to_string();
    };

    if let Some(pin) = state.pin() {
        line.push_str(&format!(" | PIN: {pin}"));
    } else if !state.potential_pin().is_empty() {
        line.push_str(&format!(" | PIN tracking: {}", state.potential_pin()));
    }

    line
}
