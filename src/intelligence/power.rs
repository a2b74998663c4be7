// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Best-effort power and the power-duration curve
//!
//! The best effort for a duration is the highest rolling average of the power
//! channel over a window of exactly that many samples. Across several
//! workouts, the curve keeps for each duration the single highest effort and
//! the workout that produced it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::WorkoutSummary;

/// Highest rolling average found in one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestEffort {
    /// Window average rounded to the nearest watt
    pub value: u32,
    /// Index of the first sample of the winning window
    pub start_index: usize,
}

/// Best power for one requested duration of one workout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPowerResult {
    pub duration_seconds: u32,
    /// `None` when the recording is shorter than the duration
    pub best_power_watts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_offset_seconds: Option<u32>,
}

/// One workout whose power stream takes part in a curve build
#[derive(Debug, Clone)]
pub struct AnalyzedWorkout {
    pub workout: WorkoutSummary,
    pub power: Vec<Option<f64>>,
}

/// Winning effort for one duration of the curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub duration_seconds: u32,
    pub label: String,
    pub best_power_watts: u32,
    pub workout_id: u64,
    pub workout_date: NaiveDate,
    pub workout_title: String,
}

/// Power-duration curve across a set of workouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerDurationCurve {
    pub workouts_analyzed: usize,
    pub workouts_skipped: usize,
    /// Points in ascending duration order
    pub curve: Vec<CurvePoint>,
    pub warnings: Vec<String>,
}

/// Maximum rolling average over windows of `duration` samples
///
/// Missing samples count as zero. The first window reaching the maximum wins:
/// later windows only replace it when strictly greater. Returns `None` when
/// `duration` is zero or longer than the stream.
pub fn compute_best_power(samples: &[Option<f64>], duration: usize) -> Option<BestEffort> {
    if duration == 0 || duration > samples.len() {
        return None;
    }

    let power = |i: usize| samples[i].unwrap_or(0.0);

    let mut window_sum: f64 = (0..duration).map(power).sum();
    let mut best_sum = window_sum;
    let mut best_start = 0;

    for end in duration..samples.len() {
        window_sum += power(end) - power(end - duration);
        if window_sum > best_sum {
            best_sum = window_sum;
            best_start = end + 1 - duration;
        }
    }

    Some(BestEffort {
        value: (best_sum / duration as f64).round().max(0.0) as u32,
        start_index: best_start,
    })
}

/// Ascending, de-duplicated, non-zero durations
pub fn normalize_durations(durations: &[u32]) -> Vec<u32> {
    let mut normalized: Vec<u32> = durations.iter().copied().filter(|d| *d > 0).collect();
    normalized.sort_unstable();
    normalized.dedup();
    normalized
}

/// Best power of a single stream for each requested duration
///
/// Durations are reported in ascending order; a duration longer than the
/// recording yields a `None` entry rather than an error. Samples are assumed
/// to be one second apart.
pub fn best_power_for_durations(
    samples: &[Option<f64>],
    durations: &[u32],
) -> Vec<BestPowerResult> {
    normalize_durations(durations)
        .into_iter()
        .map(|duration| {
            let best = compute_best_power(samples, duration as usize);
            BestPowerResult {
                duration_seconds: duration,
                best_power_watts: best.map(|b| b.value),
                start_offset_seconds: best.map(|b| b.start_index as u32),
            }
        })
        .collect()
}

/// Best effort per duration across workouts
///
/// Workouts are visited in the given order and only a strictly higher value
/// replaces the current best, so the first workout wins exact ties. Durations
/// no workout is long enough for are left out.
pub fn best_curve_points(workouts: &[AnalyzedWorkout], durations: &[u32]) -> Vec<CurvePoint> {
    let mut points = Vec::new();

    for duration in normalize_durations(durations) {
        let mut best: Option<(u32, &WorkoutSummary)> = None;

        for analyzed in workouts {
            let Some(effort) = compute_best_power(&analyzed.power, duration as usize) else {
                continue;
            };
            let improves = match best {
                Some((watts, _)) => effort.value > watts,
                None => true,
            };
            if improves {
                best = Some((effort.value, &analyzed.workout));
            }
        }

        if let Some((watts, workout)) = best {
            points.push(CurvePoint {
                duration_seconds: duration,
                label: format_duration_label(duration),
                best_power_watts: watts,
                workout_id: workout.id,
                workout_date: workout.date,
                workout_title: workout.title.clone(),
            });
        }
    }

    points
}

/// "5s", "5min" or "1min 30s"
pub fn format_duration_label(seconds: u32) -> String {
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    let minutes = seconds / 60;
    let rest = seconds % 60;
    if rest == 0 {
        format!("{}min", minutes)
    } else {
        format!("{}min {}s", minutes, rest)
    }
}
