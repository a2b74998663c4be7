// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Aerobic decoupling
//!
//! Compares heart rate per watt between the first and second half of an
//! effort. A rising ratio means the heart works harder for the same output.

use serde::{Deserialize, Serialize};

use super::{round_to, AnalysisError};
use crate::constants::analysis::{
    DECOUPLING_MINIMAL_MAX, DECOUPLING_MODERATE_MAX, INTERPRETATION_HIGH,
    INTERPRETATION_MINIMAL, INTERPRETATION_MODERATE,
};

/// Averages for one half of the effort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfMetrics {
    pub avg_power: u32,
    pub avg_heart_rate: u32,
    /// Heart rate divided by power, lower is more efficient
    pub hr_power_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecouplingResult {
    pub first_half: HalfMetrics,
    pub second_half: HalfMetrics,
    pub decoupling_percent: f64,
    pub interpretation: String,
    /// Samples left after dropping stopped intervals
    pub samples_analyzed: usize,
}

/// Raw per-half means before display rounding
struct HalfMeans {
    power: f64,
    heart_rate: f64,
}

impl HalfMeans {
    fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let n = pairs.len() as f64;
        Self {
            power: pairs.iter().map(|(p, _)| p).sum::<f64>() / n,
            heart_rate: pairs.iter().map(|(_, hr)| hr).sum::<f64>() / n,
        }
    }

    fn ratio(&self) -> f64 {
        self.heart_rate / self.power
    }

    fn to_metrics(&self) -> HalfMetrics {
        HalfMetrics {
            avg_power: self.power.round() as u32,
            avg_heart_rate: self.heart_rate.round() as u32,
            hr_power_ratio: round_to(self.ratio(), 4),
        }
    }
}

/// Drift in heart rate per watt between the two halves of a recording
///
/// Indices where both channels read zero are treated as stopped time and
/// removed before splitting. Missing readings count as zero. The streams are
/// paired by index; a shorter stream is padded with zeros.
pub fn compute_aerobic_decoupling(
    power: &[Option<f64>],
    heart_rate: &[Option<f64>],
) -> Result<DecouplingResult, AnalysisError> {
    let len = power.len().max(heart_rate.len());
    let reading =
        |stream: &[Option<f64>], i: usize| stream.get(i).copied().flatten().unwrap_or(0.0);

    let pairs: Vec<(f64, f64)> = (0..len)
        .map(|i| (reading(power, i), reading(heart_rate, i)))
        .filter(|(p, hr)| *p != 0.0 || *hr != 0.0)
        .collect();

    if pairs.is_empty() {
        return Err(AnalysisError::NoValidData);
    }
    if pairs.iter().all(|(p, _)| *p == 0.0) {
        return Err(AnalysisError::NoPowerData);
    }
    if pairs.iter().all(|(_, hr)| *hr == 0.0) {
        return Err(AnalysisError::NoHeartRateData);
    }
    if pairs.len() < 2 {
        return Err(AnalysisError::InsufficientData(
            "at least two samples are needed to split the effort".into(),
        ));
    }

    let (first, second) = pairs.split_at(pairs.len() / 2);
    let first = HalfMeans::from_pairs(first);
    let second = HalfMeans::from_pairs(second);

    if first.power == 0.0 || second.power == 0.0 {
        return Err(AnalysisError::InsufficientData(
            "one half of the effort has no power".into(),
        ));
    }

    let first_ratio = first.ratio();
    let decoupling_percent = round_to((second.ratio() - first_ratio) / first_ratio * 100.0, 2);

    Ok(DecouplingResult {
        first_half: first.to_metrics(),
        second_half: second.to_metrics(),
        decoupling_percent,
        interpretation: interpret(decoupling_percent).to_string(),
        samples_analyzed: pairs.len(),
    })
}

fn interpret(percent: f64) -> &'static str {
    let drift = percent.abs();
    if drift < DECOUPLING_MINIMAL_MAX {
        INTERPRETATION_MINIMAL
    } else if drift < DECOUPLING_MODERATE_MAX {
        INTERPRETATION_MODERATE
    } else {
        INTERPRETATION_HIGH
    }
}
