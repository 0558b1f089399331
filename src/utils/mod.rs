//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod task;

pub use task::{DelayedTask, PeriodicTask};

use std::time::Duration;

/// Convert a linear volume (0.0..=1.0) to the switcher's decibel scale
///
/// Uses `20 * log10(volume)` and clamps silence to -100 dB.
pub fn volume_to_db(volume: f64) -> f64 {
    const FLOOR_DB: f64 = -100.0;

    let volume = volume.clamp(0.0, 1.0);
    if volume <= 0.0 {
        return FLOOR_DB;
    }
    (20.0 * volume.log10()).max(FLOOR_DB)
}

/// Milliseconds in a duration, saturating at `u64::MAX`
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
