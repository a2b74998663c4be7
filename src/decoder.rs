// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Activity file decoding
//!
//! The analytics only need three things from a recording: the per-interval
//! samples, the lap aggregates and the session aggregates. [`ActivityDecoder`]
//! hides the binary format behind that shape; [`FitDecoder`] implements it for
//! FIT files.

use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};

use crate::models::{DecodedActivity, LapAggregate, Sample, SessionSummary};

/// Decoder errors
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Activity file is empty")]
    Empty,

    #[error("Failed to decode activity file: {0}")]
    Malformed(String),
}

/// Turns raw activity file bytes into records, laps and sessions
pub trait ActivityDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedActivity, DecodeError>;
}

/// FIT file decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct FitDecoder;

impl FitDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ActivityDecoder for FitDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedActivity, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let messages =
            fitparser::from_bytes(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let mut activity = DecodedActivity::default();
        for message in &messages {
            match message.kind() {
                MesgNum::Record => activity.records.push(record_sample(message)),
                MesgNum::Lap => activity.laps.push(lap_aggregate(message)),
                MesgNum::Session => activity.sessions.push(session_summary(message)),
                _ => {}
            }
        }

        Ok(activity)
    }
}

fn record_sample(message: &FitDataRecord) -> Sample {
    let mut sample = Sample::default();
    for field in message.fields() {
        match field.name() {
            "power" => sample.power = value_to_f64(field.value()),
            "heart_rate" => sample.heart_rate = value_to_f64(field.value()),
            _ => {}
        }
    }
    sample
}

fn lap_aggregate(message: &FitDataRecord) -> LapAggregate {
    let mut lap = LapAggregate::default();
    for field in message.fields() {
        let value = value_to_f64(field.value());
        match field.name() {
            "avg_power" => lap.avg_power = value,
            "max_power" => lap.max_power = value,
            "avg_heart_rate" => lap.avg_heart_rate = value,
            "max_heart_rate" => lap.max_heart_rate = value,
            "avg_cadence" => lap.avg_cadence = value,
            "total_timer_time" => lap.duration_seconds = value,
            // Elapsed time only when the device did not record timer time
            "total_elapsed_time" => {
                if lap.duration_seconds.is_none() {
                    lap.duration_seconds = value;
                }
            }
            "total_distance" => lap.distance_meters = value,
            _ => {}
        }
    }
    lap
}

fn session_summary(message: &FitDataRecord) -> SessionSummary {
    let mut session = SessionSummary::default();
    for field in message.fields() {
        match field.name() {
            "sport" => {
                if let Value::String(sport) = field.value() {
                    session.sport = Some(sport.clone());
                }
            }
            "total_timer_time" => session.total_timer_seconds = value_to_f64(field.value()),
            "total_distance" => session.total_distance_meters = value_to_f64(field.value()),
            "avg_power" => session.avg_power = value_to_f64(field.value()),
            "avg_heart_rate" => session.avg_heart_rate = value_to_f64(field.value()),
            _ => {}
        }
    }
    session
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::UInt8(v) => Some(*v as f64),
        Value::SInt8(v) => Some(*v as f64),
        Value::UInt16(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt64(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::Byte(v) => Some(*v as f64),
        Value::Array(values) => values.iter().find_map(value_to_f64),
        _ => None,
    }
}
