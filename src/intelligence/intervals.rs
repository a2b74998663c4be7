// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Interval comparison across workouts
//!
//! Laps are aligned by position: row N holds lap N of every compared workout.
//! A workout without an Nth lap still appears in that row, carrying only its
//! identity so that the comparison stays rectangular.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decoder::ActivityDecoder;
use crate::models::{LapAggregate, WorkoutSummary};

/// Optional lap filters applied before alignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LapFilters {
    /// Keep laps whose average power is at least this many watts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_power: Option<f64>,
    /// Keep laps close to this duration (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<f64>,
    /// Allowed deviation from `target_duration` (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl LapFilters {
    /// Whether a lap passes every configured filter
    ///
    /// Laps missing the filtered metric never pass.
    pub fn accepts(&self, lap: &LapAggregate, default_tolerance: f64) -> bool {
        if let Some(min_power) = self.min_power {
            match lap.avg_power {
                Some(power) if power >= min_power => {}
                _ => return false,
            }
        }

        if let Some(target) = self.target_duration {
            let tolerance = self.tolerance.unwrap_or(default_tolerance);
            match lap.duration_seconds {
                Some(duration) if (duration - target).abs() <= tolerance => {}
                _ => return false,
            }
        }

        true
    }

    pub fn is_empty(&self) -> bool {
        self.min_power.is_none() && self.target_duration.is_none()
    }
}

/// Laps of one compared workout
#[derive(Debug, Clone)]
pub struct WorkoutLaps {
    pub workout_id: u64,
    /// Metadata, when it could be fetched
    pub workout: Option<WorkoutSummary>,
    pub laps: Vec<LapAggregate>,
}

impl WorkoutLaps {
    fn title(&self) -> Option<String> {
        self.workout.as_ref().map(|w| w.title.clone())
    }

    fn date(&self) -> Option<NaiveDate> {
        self.workout.as_ref().map(|w| w.date)
    }
}

/// One workout's entry in an aligned row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedLapValue {
    pub workout_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workout_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cadence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedLapRow {
    /// 1-based lap position
    pub lap_number: usize,
    /// One value per compared workout, in request order
    pub values: Vec<AlignedLapValue>,
}

/// Per-workout statistics over the filtered laps
///
/// Aggregates are `None` when no lap carries the metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSummary {
    pub workout_id: u64,
    pub workout_title: Option<String>,
    pub workout_date: Option<NaiveDate>,
    pub lap_count: usize,
    pub avg_power_mean: Option<f64>,
    pub avg_power_min: Option<f64>,
    pub avg_power_max: Option<f64>,
    pub power_range: Option<f64>,
    pub avg_cadence_mean: Option<f64>,
    pub total_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalComparison {
    pub workouts: Vec<IntervalSummary>,
    pub rows: Vec<AlignedLapRow>,
    pub filters: LapFilters,
    pub warnings: Vec<String>,
}

/// Lap aggregates of an activity file, or nothing when it cannot be decoded
pub fn parse_laps_from_decoded(decoder: &dyn ActivityDecoder, bytes: &[u8]) -> Vec<LapAggregate> {
    match decoder.decode(bytes) {
        Ok(decoded) => decoded.laps,
        Err(e) => {
            debug!("Treating undecodable activity file as lap-less: {}", e);
            Vec::new()
        }
    }
}

pub fn filter_laps(
    laps: &[LapAggregate],
    filters: &LapFilters,
    default_tolerance: f64,
) -> Vec<LapAggregate> {
    laps.iter()
        .filter(|lap| filters.accepts(lap, default_tolerance))
        .cloned()
        .collect()
}

/// Positional alignment; the row count is the longest lap list
pub fn align_laps(workouts: &[WorkoutLaps]) -> Vec<AlignedLapRow> {
    let row_count = workouts.iter().map(|w| w.laps.len()).max().unwrap_or(0);

    (0..row_count)
        .map(|index| AlignedLapRow {
            lap_number: index + 1,
            values: workouts
                .iter()
                .map(|workout| {
                    let identity = AlignedLapValue {
                        workout_id: workout.workout_id,
                        workout_title: workout.title(),
                        workout_date: workout.date(),
                        ..AlignedLapValue::default()
                    };
                    match workout.laps.get(index) {
                        Some(lap) => AlignedLapValue {
                            avg_power: lap.avg_power,
                            max_power: lap.max_power,
                            avg_heart_rate: lap.avg_heart_rate,
                            avg_cadence: lap.avg_cadence,
                            duration: lap.duration_seconds,
                            ..identity
                        },
                        None => identity,
                    }
                })
                .collect(),
        })
        .collect()
}

pub fn summarize_laps(workout: &WorkoutLaps) -> IntervalSummary {
    let powers: Vec<f64> = workout.laps.iter().filter_map(|l| l.avg_power).collect();
    let cadences: Vec<f64> = workout.laps.iter().filter_map(|l| l.avg_cadence).collect();
    let durations: Vec<f64> = workout.laps.iter().filter_map(|l| l.duration_seconds).collect();

    let min = powers.iter().copied().reduce(f64::min);
    let max = powers.iter().copied().reduce(f64::max);

    IntervalSummary {
        workout_id: workout.workout_id,
        workout_title: workout.title(),
        workout_date: workout.date(),
        lap_count: workout.laps.len(),
        avg_power_mean: mean(&powers),
        avg_power_min: min,
        avg_power_max: max,
        power_range: min.zip(max).map(|(lo, hi)| hi - lo),
        avg_cadence_mean: mean(&cadences),
        total_duration_seconds: if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum())
        },
    }
}

/// Filter, align and summarize the laps of several workouts
pub fn build_comparison(
    workouts: Vec<WorkoutLaps>,
    filters: LapFilters,
    default_tolerance: f64,
    warnings: Vec<String>,
) -> IntervalComparison {
    let filtered: Vec<WorkoutLaps> = workouts
        .into_iter()
        .map(|w| WorkoutLaps {
            laps: filter_laps(&w.laps, &filters, default_tolerance),
            ..w
        })
        .collect();

    IntervalComparison {
        workouts: filtered.iter().map(summarize_laps).collect(),
        rows: align_laps(&filtered),
        filters,
        warnings,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeError;
    use crate::models::{DecodedActivity, SportType};

    fn lap(power: f64, duration: f64) -> LapAggregate {
        LapAggregate {
            avg_power: Some(power),
            max_power: Some(power + 50.0),
            avg_cadence: Some(90.0),
            duration_seconds: Some(duration),
            ..LapAggregate::default()
        }
    }

    fn workout(id: u64, laps: Vec<LapAggregate>) -> WorkoutLaps {
        WorkoutLaps {
            workout_id: id,
            workout: Some(WorkoutSummary {
                id,
                title: format!("Intervals {}", id),
                date: NaiveDate::from_ymd_opt(2024, 3, id as u32).unwrap(),
                sport: SportType::Bike,
                total_time_hours: None,
                tss: None,
                distance_meters: None,
            }),
            laps,
        }
    }

    #[test]
    fn test_alignment_pads_missing_laps() {
        let workouts = vec![
            workout(1, vec![lap(250.0, 300.0)]),
            workout(2, vec![lap(260.0, 300.0), lap(270.0, 300.0)]),
            workout(3, vec![lap(240.0, 300.0)]),
        ];

        let rows = align_laps(&workouts);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.values.len() == 3));
        assert_eq!(rows[1].lap_number, 2);

        let second = &rows[1].values;
        assert_eq!(second[0].workout_id, 1);
        assert_eq!(second[0].avg_power, None);
        assert_eq!(second[0].workout_title.as_deref(), Some("Intervals 1"));
        assert_eq!(second[1].avg_power, Some(270.0));
        assert_eq!(second[2].duration, None);

        // Absent metrics are omitted, not serialized as zero or null
        let json = serde_json::to_value(&second[0]).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("workout_id"));
        assert!(!object.contains_key("avg_power"));
        assert!(!object.contains_key("duration"));
    }

    #[test]
    fn test_alignment_of_empty_set() {
        assert!(align_laps(&[]).is_empty());
        assert!(align_laps(&[workout(1, vec![])]).is_empty());
    }

    #[test]
    fn test_min_power_filter_drops_missing_power() {
        let laps = vec![
            lap(180.0, 60.0),
            lap(300.0, 60.0),
            LapAggregate {
                duration_seconds: Some(60.0),
                ..LapAggregate::default()
            },
        ];
        let filters = LapFilters {
            min_power: Some(200.0),
            ..LapFilters::default()
        };
        let kept = filter_laps(&laps, &filters, 10.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].avg_power, Some(300.0));
    }

    #[test]
    fn test_min_power_threshold_is_inclusive() {
        let filters = LapFilters {
            min_power: Some(250.0),
            ..LapFilters::default()
        };
        assert!(filters.accepts(&lap(250.0, 60.0), 10.0));
    }

    #[test]
    fn test_duration_filter_uses_tolerance() {
        let laps = vec![lap(250.0, 295.0), lap(250.0, 320.0), lap(250.0, 60.0)];
        let mut filters = LapFilters {
            target_duration: Some(300.0),
            ..LapFilters::default()
        };

        assert_eq!(filter_laps(&laps, &filters, 10.0).len(), 1);

        filters.tolerance = Some(25.0);
        assert_eq!(filter_laps(&laps, &filters, 10.0).len(), 2);

        let no_duration = LapAggregate {
            avg_power: Some(250.0),
            ..LapAggregate::default()
        };
        assert!(!filters.accepts(&no_duration, 10.0));
    }

    #[test]
    fn test_summary_statistics() {
        let summary = summarize_laps(&workout(
            1,
            vec![lap(200.0, 300.0), lap(260.0, 300.0), lap(230.0, 240.0)],
        ));

        assert_eq!(summary.lap_count, 3);
        assert_eq!(summary.avg_power_mean, Some(230.0));
        assert_eq!(summary.avg_power_min, Some(200.0));
        assert_eq!(summary.avg_power_max, Some(260.0));
        assert_eq!(summary.power_range, Some(60.0));
        assert_eq!(summary.avg_cadence_mean, Some(90.0));
        assert_eq!(summary.total_duration_seconds, Some(840.0));
    }

    #[test]
    fn test_summary_without_laps_has_null_aggregates() {
        let summary = summarize_laps(&workout(4, vec![]));
        assert_eq!(summary.lap_count, 0);
        assert_eq!(summary.avg_power_mean, None);
        assert_eq!(summary.power_range, None);
        assert_eq!(summary.total_duration_seconds, None);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["avg_power_mean"].is_null());
        assert_eq!(json["lap_count"], 0);
    }

    #[test]
    fn test_build_comparison_filters_before_aligning() {
        let workouts = vec![
            workout(1, vec![lap(150.0, 600.0), lap(300.0, 300.0), lap(310.0, 300.0)]),
            workout(2, vec![lap(320.0, 300.0)]),
        ];
        let filters = LapFilters {
            min_power: Some(250.0),
            ..LapFilters::default()
        };

        let warnings = vec!["workout 9: no file available".to_string()];
        let comparison = build_comparison(workouts, filters, 10.0, warnings);

        assert_eq!(comparison.rows.len(), 2);
        assert_eq!(comparison.rows[0].values[0].avg_power, Some(300.0));
        assert_eq!(comparison.workouts[0].lap_count, 2);
        assert_eq!(comparison.workouts[1].lap_count, 1);
        assert_eq!(comparison.warnings.len(), 1);
    }

    struct FailingDecoder;

    impl ActivityDecoder for FailingDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<DecodedActivity, DecodeError> {
            Err(DecodeError::Malformed("bad header".into()))
        }
    }

    struct LapDecoder;

    impl ActivityDecoder for LapDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<DecodedActivity, DecodeError> {
            Ok(DecodedActivity {
                laps: vec![lap(200.0, 60.0), lap(210.0, 60.0)],
                ..DecodedActivity::default()
            })
        }
    }

    #[test]
    fn test_parse_laps_never_fails() {
        assert!(parse_laps_from_decoded(&FailingDecoder, b"xx").is_empty());
        assert_eq!(parse_laps_from_decoded(&LapDecoder, b"xx").len(), 2);
    }
}
