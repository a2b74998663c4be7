// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{TokenProvider, WorkoutProvider};
use crate::constants::api::{DEFAULT_MAX_RETRIES, LIST_CHUNK_DAYS, MAX_BACKOFF_SECONDS};
use crate::models::{SportType, WorkoutSummary};

pub struct TrainingPeaksProvider {
    client: Client,
    base_url: String,
    athlete_id: u64,
    tokens: Arc<dyn TokenProvider>,
    max_retries: u32,
}

impl TrainingPeaksProvider {
    pub fn new(base_url: String, athlete_id: u64, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            athlete_id,
            tokens,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn workouts_path(&self) -> String {
        format!("/fitness/v6/athletes/{}/workouts", self.athlete_id)
    }

    /// GET with bearer auth
    ///
    /// A 401 invalidates the token and retries once. A 429 waits for
    /// `Retry-After` (or an exponential backoff) up to `max_retries` times.
    /// Any other status is returned to the caller.
    async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut reauthenticated = false;
        let mut rate_limited = 0;

        loop {
            let token = self.tokens.access_token().await?;
            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", path))?;

            match response.status() {
                StatusCode::UNAUTHORIZED if !reauthenticated => {
                    warn!("Access token rejected for {}, retrying with a fresh token", path);
                    self.tokens.invalidate();
                    reauthenticated = true;
                }
                StatusCode::TOO_MANY_REQUESTS if rate_limited < self.max_retries => {
                    let wait = retry_after(&response).unwrap_or_else(|| backoff(rate_limited));
                    rate_limited += 1;
                    warn!(
                        "Rate limited on {} (attempt {}/{}), waiting {:?}",
                        path, rate_limited, self.max_retries, wait
                    );
                    tokio::time::sleep(wait).await;
                }
                _ => return Ok(response),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("GET {} failed with status {}", path, status));
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

#[async_trait]
impl WorkoutProvider for TrainingPeaksProvider {
    async fn list_workouts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkoutSummary>> {
        if start > end {
            return Err(anyhow::anyhow!(
                "Start date {} is after end date {}",
                start,
                end
            ));
        }

        let mut seen = HashSet::new();
        let mut workouts = Vec::new();

        for (chunk_start, chunk_end) in date_chunks(start, end, LIST_CHUNK_DAYS) {
            let path = format!("{}/{}/{}", self.workouts_path(), chunk_start, chunk_end);
            let chunk: Vec<TpWorkout> = self.get_json(&path).await?;
            debug!(
                "Listed {} workouts between {} and {}",
                chunk.len(),
                chunk_start,
                chunk_end
            );

            for workout in chunk {
                if !seen.insert(workout.workout_id) {
                    continue;
                }
                match workout.into_summary() {
                    Ok(summary) => workouts.push(summary),
                    Err(e) => warn!("Skipping listed workout: {:#}", e),
                }
            }
        }

        workouts.sort_by_key(|w| w.date);
        info!("Listed {} workouts from {} to {}", workouts.len(), start, end);
        Ok(workouts)
    }

    async fn fetch_workout(&self, workout_id: u64) -> Result<WorkoutSummary> {
        let path = format!("{}/{}", self.workouts_path(), workout_id);
        let workout: TpWorkout = self.get_json(&path).await?;
        workout.into_summary()
    }

    async fn fetch_activity_bytes(&self, workout_id: u64) -> Result<Option<Vec<u8>>> {
        let path = format!("{}/{}/rawfiledata", self.workouts_path(), workout_id);
        let response = self.get(&path).await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Workout {} has no activity file", workout_id);
                Ok(None)
            }
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .with_context(|| format!("Failed to read activity file for {}", workout_id))?;
                if bytes.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(bytes.to_vec()))
                }
            }
            status => Err(anyhow::anyhow!(
                "Activity file download for workout {} failed with status {}",
                workout_id,
                status
            )),
        }
    }

    fn provider_name(&self) -> &'static str {
        "TrainingPeaks"
    }
}

/// Split an inclusive date range into consecutive inclusive chunks of at
/// most `max_days` days
pub fn date_chunks(start: NaiveDate, end: NaiveDate, max_days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let span = Days::new(max_days.max(1) as u64 - 1);
    let mut chunks = Vec::new();
    let mut chunk_start = start;

    while chunk_start <= end {
        let chunk_end = chunk_start
            .checked_add_days(span)
            .map_or(end, |d| d.min(end));
        chunks.push((chunk_start, chunk_end));
        match chunk_end.succ_opt() {
            Some(next) => chunk_start = next,
            None => break,
        }
    }

    chunks
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(MAX_BACKOFF_SECONDS)))
}

fn backoff(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECONDS);
    Duration::from_secs(secs)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TpWorkout {
    workout_id: u64,
    title: Option<String>,
    /// Local date at midnight, e.g. `2024-03-09T00:00:00`
    workout_day: String,
    workout_type_value_id: Option<u32>,
    total_time: Option<f64>,
    tss_actual: Option<f64>,
    distance: Option<f64>,
}

impl TpWorkout {
    fn into_summary(self) -> Result<WorkoutSummary> {
        let day = self.workout_day.get(..10).unwrap_or(&self.workout_day);
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").with_context(|| {
            format!(
                "Invalid workoutDay '{}' for workout {}",
                self.workout_day, self.workout_id
            )
        })?;

        Ok(WorkoutSummary {
            id: self.workout_id,
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Workout {}", self.workout_id)),
            date,
            sport: self
                .workout_type_value_id
                .map(SportType::from_type_id)
                .unwrap_or(SportType::Other(0)),
            total_time_hours: self.total_time,
            tss: self.tss_actual,
            distance_meters: self.distance,
        })
    }
}
