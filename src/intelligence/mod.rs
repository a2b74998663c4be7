// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Intelligence Module
//!
//! Derived athletic metrics computed from decoded activity files.
//!
//! This module includes:
//! - Best-effort power over sliding windows and the cross-workout
//!   power-duration curve
//! - Aerobic decoupling (heart-rate-per-watt drift between halves)
//! - Positional lap alignment and interval summaries across workouts
//!
//! Everything here is pure computation over [`crate::models`] shapes; fetching
//! and caching live in [`crate::service`].

pub mod decoupling;
pub mod intervals;
pub mod power;

pub use decoupling::{compute_aerobic_decoupling, DecouplingResult, HalfMetrics};
pub use intervals::{
    AlignedLapRow, AlignedLapValue, IntervalComparison, IntervalSummary, LapFilters, WorkoutLaps,
};
pub use power::{
    compute_best_power, format_duration_label, BestEffort, BestPowerResult, CurvePoint,
    PowerDurationCurve,
};

use crate::decoder::DecodeError;

/// Errors that can occur during single-workout analysis
///
/// Multi-workout operations never return these for individual workouts; they
/// turn them into warnings instead.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no power data")]
    NoPowerData,

    #[error("no heart-rate data")]
    NoHeartRateData,

    #[error("no record data")]
    NoRecordData,

    #[error("no valid data after removing stopped samples")]
    NoValidData,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("no file available for workout {0}")]
    FileNotFound(u64),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("provider request failed: {0}")]
    Provider(#[from] anyhow::Error),
}

/// Round to a fixed number of decimal places
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
