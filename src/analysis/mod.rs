//! Analysis Layer
//!
//! Turns noisy per-frame decode candidates into a single trustworthy
//! result: temporal debouncing, shop classification, and the events the
//! rest of the system consumes.

pub mod events;
pub mod shops;
pub mod stability;

pub use events::ScanEvent;
pub use shops::{classify, validate_for_shop, Classification, Shop};
pub use stability::{CycleOutcome, LockedCode, StabilityState, TrackStatus};
