// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Analysis Service
//!
//! Ties the activity file cache, the workout provider and the decoder to the
//! analysis engines. The cache is always consulted first; on a miss the file
//! is downloaded, stored and only then decoded.
//!
//! Single-workout operations fail with an [`AnalysisError`]. Multi-workout
//! operations never fail because of one workout: problems become warnings in
//! the result.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{ActivityFileCache, CacheStats, ClearSummary};
use crate::config::AnalysisConfig;
use crate::decoder::ActivityDecoder;
use crate::intelligence::decoupling::{compute_aerobic_decoupling, DecouplingResult};
use crate::intelligence::intervals::{
    build_comparison, parse_laps_from_decoded, IntervalComparison, LapFilters, WorkoutLaps,
};
use crate::intelligence::power::{
    best_curve_points, best_power_for_durations, AnalyzedWorkout, BestPowerResult,
    PowerDurationCurve,
};
use crate::intelligence::AnalysisError;
use crate::logging::AppLogger;
use crate::models::{DecodedActivity, WorkoutSummary};
use crate::providers::WorkoutProvider;

/// Best power of one workout across the requested durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPowerReport {
    pub workout_id: u64,
    pub samples_analyzed: usize,
    pub results: Vec<BestPowerResult>,
}

pub struct AnalysisService {
    provider: Arc<dyn WorkoutProvider>,
    decoder: Arc<dyn ActivityDecoder>,
    cache: Arc<ActivityFileCache>,
    config: AnalysisConfig,
}

impl AnalysisService {
    pub fn new(
        provider: Arc<dyn WorkoutProvider>,
        decoder: Arc<dyn ActivityDecoder>,
        cache: Arc<ActivityFileCache>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            decoder,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ActivityFileCache> {
        &self.cache
    }

    /// Raw activity file bytes, from the cache or the provider
    ///
    /// Downloaded bytes are cached before they are returned. A failed cache
    /// write is logged and does not fail the call.
    pub async fn activity_bytes(&self, workout_id: u64) -> Result<Option<Vec<u8>>, AnalysisError> {
        if let Some(bytes) = self.cache.get(workout_id).await {
            AppLogger::log_cache_event("hit", workout_id, Some(bytes.len() as u64));
            return Ok(Some(bytes));
        }
        AppLogger::log_cache_event("miss", workout_id, None);

        let Some(bytes) = self.provider.fetch_activity_bytes(workout_id).await? else {
            return Ok(None);
        };

        match self.cache.set(workout_id, &bytes).await {
            Ok(()) => AppLogger::log_cache_event("store", workout_id, Some(bytes.len() as u64)),
            Err(e) => warn!("Failed to cache activity file for workout {}: {}", workout_id, e),
        }

        Ok(Some(bytes))
    }

    pub async fn load_activity(&self, workout_id: u64) -> Result<DecodedActivity, AnalysisError> {
        let bytes = self
            .activity_bytes(workout_id)
            .await?
            .ok_or(AnalysisError::FileNotFound(workout_id))?;
        Ok(self.decoder.decode(&bytes)?)
    }

    /// Best power per duration for a single workout
    ///
    /// An empty `durations` uses the configured standard durations. A
    /// duration longer than the recording comes back with a `None` value.
    pub async fn get_best_power(
        &self,
        workout_id: u64,
        durations: &[u32],
    ) -> Result<BestPowerReport, AnalysisError> {
        let activity = self.load_activity(workout_id).await?;
        if activity.records.is_empty() {
            return Err(AnalysisError::NoRecordData);
        }
        if !activity.has_power() {
            return Err(AnalysisError::NoPowerData);
        }

        let durations = self.durations_or_default(durations);
        let power = activity.power_samples();

        Ok(BestPowerReport {
            workout_id,
            samples_analyzed: power.len(),
            results: best_power_for_durations(&power, durations),
        })
    }

    pub async fn get_aerobic_decoupling(
        &self,
        workout_id: u64,
    ) -> Result<DecouplingResult, AnalysisError> {
        let activity = self.load_activity(workout_id).await?;
        if activity.records.is_empty() {
            return Err(AnalysisError::NoRecordData);
        }
        compute_aerobic_decoupling(&activity.power_samples(), &activity.heart_rate_samples())
    }

    /// Best power per duration across cycling workouts
    ///
    /// Files are fetched and decoded in concurrent batches. Workouts without a
    /// file or without power are skipped with a warning.
    pub async fn build_power_duration_curve(
        &self,
        workouts: &[WorkoutSummary],
        durations: &[u32],
        excluded_ids: &HashSet<u64>,
    ) -> PowerDurationCurve {
        let candidates: Vec<&WorkoutSummary> = workouts
            .iter()
            .filter(|w| w.sport.is_cycling() && !excluded_ids.contains(&w.id))
            .collect();

        let mut analyzed = Vec::new();
        let mut warnings = Vec::new();
        let batch_size = self.config.curve_batch_size.max(1);

        for batch in candidates.chunks(batch_size) {
            let outcomes = join_all(batch.iter().map(|w| self.curve_power_stream(w.id))).await;

            for (workout, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(power) => analyzed.push(AnalyzedWorkout {
                        workout: (*workout).clone(),
                        power,
                    }),
                    Err(reason) => {
                        AppLogger::log_analysis_skip("power_duration_curve", workout.id, &reason);
                        warnings.push(format!(
                            "workout {} ({}, {}): {}",
                            workout.id, workout.title, workout.date, reason
                        ));
                    }
                }
            }
        }

        let curve = best_curve_points(&analyzed, self.durations_or_default(durations));
        info!(
            "Power curve built from {} workouts ({} skipped, {} points)",
            analyzed.len(),
            warnings.len(),
            curve.len()
        );

        PowerDurationCurve {
            workouts_analyzed: analyzed.len(),
            workouts_skipped: warnings.len(),
            curve,
            warnings,
        }
    }

    /// List workouts in the date range, then build the curve
    pub async fn power_duration_curve_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        durations: &[u32],
        excluded_ids: &HashSet<u64>,
    ) -> Result<PowerDurationCurve, AnalysisError> {
        let workouts = self.provider.list_workouts(start, end).await?;
        debug!(
            "{} workouts between {} and {} from {}",
            workouts.len(),
            start,
            end,
            self.provider.provider_name()
        );
        Ok(self
            .build_power_duration_curve(&workouts, durations, excluded_ids)
            .await)
    }

    /// Align and summarize laps across workouts
    ///
    /// Each workout's file and metadata are fetched concurrently. A workout
    /// without a file contributes no laps and a warning.
    pub async fn compare_intervals(
        &self,
        workout_ids: &[u64],
        filters: LapFilters,
    ) -> IntervalComparison {
        let fetched = join_all(workout_ids.iter().map(|&id| self.workout_laps(id))).await;

        let mut workouts = Vec::with_capacity(fetched.len());
        let mut warnings = Vec::new();
        for (laps, warning) in fetched {
            workouts.push(laps);
            warnings.extend(warning);
        }

        build_comparison(
            workouts,
            filters,
            self.config.interval_tolerance_seconds,
            warnings,
        )
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) -> ClearSummary {
        self.cache.clear().await
    }

    pub async fn delete_cached_file(&self, workout_id: u64) -> bool {
        self.cache.delete(workout_id).await
    }

    fn durations_or_default<'a>(&'a self, durations: &'a [u32]) -> &'a [u32] {
        if durations.is_empty() {
            &self.config.default_durations
        } else {
            durations
        }
    }

    /// Power stream for the curve, or the reason the workout is skipped
    async fn curve_power_stream(&self, workout_id: u64) -> Result<Vec<Option<f64>>, String> {
        let bytes = match self.activity_bytes(workout_id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err("no file available".to_string()),
            Err(e) => return Err(format!("no file available ({})", e)),
        };

        let activity = self.decoder.decode(&bytes).map_err(|e| e.to_string())?;
        if !activity.has_power() {
            return Err(AnalysisError::NoPowerData.to_string());
        }
        Ok(activity.power_samples())
    }

    async fn workout_laps(&self, workout_id: u64) -> (WorkoutLaps, Option<String>) {
        let (bytes, metadata) = tokio::join!(
            self.activity_bytes(workout_id),
            self.provider.fetch_workout(workout_id)
        );

        let workout = match metadata {
            Ok(workout) => Some(workout),
            Err(e) => {
                debug!("No metadata for workout {}: {}", workout_id, e);
                None
            }
        };

        let (laps, warning) = match bytes {
            Ok(Some(bytes)) => (parse_laps_from_decoded(self.decoder.as_ref(), &bytes), None),
            Ok(None) => (Vec::new(), Some(format!("workout {}: no file available", workout_id))),
            Err(e) => {
                AppLogger::log_analysis_skip("compare_intervals", workout_id, &e.to_string());
                (Vec::new(), Some(format!("workout {}: no file available", workout_id)))
            }
        };

        (
            WorkoutLaps {
                workout_id,
                workout,
                laps,
            },
            warning,
        )
    }
}
