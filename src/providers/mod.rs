// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::ApiConfig;
use crate::models::WorkoutSummary;

pub mod trainingpeaks;

/// Source of the bearer token used against the training service
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Called after the service rejected the current token
    fn invalidate(&self) {}
}

/// Token captured once by an external login flow
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        self.token
            .clone()
            .context("Not authenticated: no access token configured")
    }
}

#[async_trait]
pub trait WorkoutProvider: Send + Sync {
    /// Workouts performed between `start` and `end`, both inclusive
    async fn list_workouts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkoutSummary>>;

    async fn fetch_workout(&self, workout_id: u64) -> Result<WorkoutSummary>;

    /// Raw activity file, `None` when the workout has no file
    async fn fetch_activity_bytes(&self, workout_id: u64) -> Result<Option<Vec<u8>>>;

    fn provider_name(&self) -> &'static str;
}

pub fn create_provider(config: &ApiConfig) -> Result<Arc<dyn WorkoutProvider>> {
    let athlete_id = config
        .athlete_id
        .context("Athlete id not configured (set TP_ATHLETE_ID or api.athlete_id)")?;

    let tokens = Arc::new(StaticTokenProvider::new(config.access_token.clone()));
    let provider =
        trainingpeaks::TrainingPeaksProvider::new(config.base_url.clone(), athlete_id, tokens)
            .with_max_retries(config.max_retries);

    Ok(Arc::new(provider))
}
