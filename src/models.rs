// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Data Models
//!
//! Core data structures shared by the cache, the decoder and the analytics
//! engines.
//!
//! ## Core Models
//!
//! - [`Sample`]: One per-interval reading from an activity recording
//! - [`LapAggregate`]: Summary statistics of one recorded lap
//! - [`SessionSummary`]: Whole-session aggregates reported by the device
//! - [`DecodedActivity`]: Everything the decoder extracts from one file
//! - [`WorkoutSummary`]: Workout metadata used to label results
//! - [`SportType`]: Workout discipline as reported by the training service

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One timestep of an activity recording (typically 1 Hz)
///
/// Both channels are optional: a sample without a power meter reading or
/// without a heart rate strap simply carries `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Power in watts
    pub power: Option<f64>,
    /// Heart rate in beats per minute
    pub heart_rate: Option<f64>,
}

impl Sample {
    pub fn new(power: Option<f64>, heart_rate: Option<f64>) -> Self {
        Self { power, heart_rate }
    }
}

/// Aggregates for a single recorded lap
///
/// Every field is optional because devices report laps with very different
/// levels of detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LapAggregate {
    /// Average power over the lap (watts)
    pub avg_power: Option<f64>,
    /// Maximum power over the lap (watts)
    pub max_power: Option<f64>,
    /// Average heart rate (BPM)
    pub avg_heart_rate: Option<f64>,
    /// Maximum heart rate (BPM)
    pub max_heart_rate: Option<f64>,
    /// Average cadence (RPM)
    pub avg_cadence: Option<f64>,
    /// Lap duration in seconds
    pub duration_seconds: Option<f64>,
    /// Lap distance in meters
    pub distance_meters: Option<f64>,
}

/// Session-level aggregates reported by the recording device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Sport as written by the device (e.g. "cycling")
    pub sport: Option<String>,
    /// Total timer time in seconds
    pub total_timer_seconds: Option<f64>,
    /// Total distance in meters
    pub total_distance_meters: Option<f64>,
    /// Average power (watts)
    pub avg_power: Option<f64>,
    /// Average heart rate (BPM)
    pub avg_heart_rate: Option<f64>,
}

/// Decoded content of one activity file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedActivity {
    /// Ordered per-interval samples
    pub records: Vec<Sample>,
    /// Ordered lap aggregates, index 0 = lap 1
    pub laps: Vec<LapAggregate>,
    /// Session aggregates (usually exactly one)
    pub sessions: Vec<SessionSummary>,
}

impl DecodedActivity {
    /// Power channel of the recording, in sample order
    pub fn power_samples(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|s| s.power).collect()
    }

    /// Heart rate channel of the recording, in sample order
    pub fn heart_rate_samples(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|s| s.heart_rate).collect()
    }

    /// True if at least one sample carries a strictly positive power value
    pub fn has_power(&self) -> bool {
        self.records
            .iter()
            .any(|s| s.power.map_or(false, |p| p > 0.0))
    }

    /// Sport reported by the first session, if any
    pub fn sport(&self) -> Option<&str> {
        self.sessions.iter().find_map(|s| s.sport.as_deref())
    }
}

/// Workout metadata from the training service
///
/// # Examples
///
/// ```rust
/// use trainingpeaks_mcp::models::{SportType, WorkoutSummary};
/// use chrono::NaiveDate;
///
/// let workout = WorkoutSummary {
///     id: 123456,
///     title: "Sweet spot 3x15".to_string(),
///     date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
///     sport: SportType::Bike,
///     total_time_hours: Some(1.5),
///     tss: Some(92.0),
///     distance_meters: Some(45000.0),
/// };
/// assert!(workout.sport.is_cycling());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    /// Workout identifier (unique per athlete)
    pub id: u64,
    /// Title given to the workout
    pub title: String,
    /// Day the workout was performed
    pub date: NaiveDate,
    /// Discipline of the workout
    pub sport: SportType,
    /// Completed duration in hours
    pub total_time_hours: Option<f64>,
    /// Training stress score
    pub tss: Option<f64>,
    /// Completed distance in meters
    pub distance_meters: Option<f64>,
}

/// Workout discipline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportType {
    Swim,
    Bike,
    Run,
    Brick,
    Crosstrain,
    Race,
    DayOff,
    MountainBike,
    Strength,
    Custom,
    XcSki,
    Rowing,
    Walk,
    /// Any type id the mapping does not know about
    Other(u32),
}

impl SportType {
    /// Map the training service's workout type id
    pub fn from_type_id(type_id: u32) -> Self {
        match type_id {
            1 => SportType::Swim,
            2 => SportType::Bike,
            3 => SportType::Run,
            4 => SportType::Brick,
            5 => SportType::Crosstrain,
            6 => SportType::Race,
            7 => SportType::DayOff,
            8 => SportType::MountainBike,
            9 => SportType::Strength,
            10 => SportType::Custom,
            11 => SportType::XcSki,
            12 => SportType::Rowing,
            13 => SportType::Walk,
            other => SportType::Other(other),
        }
    }

    /// Only road/indoor cycling counts towards the power-duration curve
    pub fn is_cycling(&self) -> bool {
        matches!(self, SportType::Bike)
    }

    /// Get the human-readable name for this sport type
    pub fn display_name(&self) -> &'static str {
        match self {
            SportType::Swim => "swim",
            SportType::Bike => "bike",
            SportType::Run => "run",
            SportType::Brick => "brick",
            SportType::Crosstrain => "cross training",
            SportType::Race => "race",
            SportType::DayOff => "day off",
            SportType::MountainBike => "mountain bike",
            SportType::Strength => "strength",
            SportType::Custom => "custom",
            SportType::XcSki => "cross-country ski",
            SportType::Rowing => "rowing",
            SportType::Walk => "walk",
            SportType::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sport_type_mapping() {
        assert_eq!(SportType::from_type_id(2), SportType::Bike);
        assert_eq!(SportType::from_type_id(3), SportType::Run);
        assert_eq!(SportType::from_type_id(8), SportType::MountainBike);
        assert_eq!(SportType::from_type_id(100), SportType::Other(100));
    }

    #[test]
    fn test_only_bike_is_cycling() {
        assert!(SportType::Bike.is_cycling());
        assert!(!SportType::MountainBike.is_cycling());
        assert!(!SportType::Run.is_cycling());
    }

    #[test]
    fn test_decoded_activity_channels() {
        let activity = DecodedActivity {
            records: vec![
                Sample::new(Some(0.0), Some(120.0)),
                Sample::new(None, Some(125.0)),
                Sample::new(Some(210.0), None),
            ],
            laps: vec![],
            sessions: vec![SessionSummary {
                sport: Some("cycling".to_string()),
                ..Default::default()
            }],
        };

        assert_eq!(activity.power_samples(), vec![Some(0.0), None, Some(210.0)]);
        assert_eq!(
            activity.heart_rate_samples(),
            vec![Some(120.0), Some(125.0), None]
        );
        assert!(activity.has_power());
        assert_eq!(activity.sport(), Some("cycling"));
    }

    #[test]
    fn test_zero_power_is_not_power() {
        let activity = DecodedActivity {
            records: vec![Sample::new(Some(0.0), Some(100.0)); 10],
            ..Default::default()
        };
        assert!(!activity.has_power());
    }
}
