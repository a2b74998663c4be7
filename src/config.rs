// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration management for the TrainingPeaks MCP server

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{analysis, api, cache, env_config};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API base URL
    pub base_url: String,
    /// Athlete whose workouts are analyzed
    pub athlete_id: Option<u64>,
    /// Bearer token captured by the login flow
    pub access_token: Option<String>,
    /// Retries on rate limiting
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one file per cached workout
    pub directory: PathBuf,
    /// Total byte budget before least-recently-used eviction
    pub max_bytes: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Workouts fetched concurrently per power curve batch
    pub curve_batch_size: usize,
    /// Durations used when a request does not name any
    pub default_durations: Vec<u32>,
    /// Default tolerance for lap duration filtering
    pub interval_tolerance_seconds: f64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: api::DEFAULT_API_BASE.to_string(),
            athlete_id: None,
            access_token: None,
            max_retries: api::DEFAULT_MAX_RETRIES,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            max_bytes: cache::DEFAULT_MAX_BYTES,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            curve_batch_size: analysis::CURVE_BATCH_SIZE,
            default_durations: analysis::STANDARD_DURATIONS.to_vec(),
            interval_tolerance_seconds: analysis::DEFAULT_INTERVAL_TOLERANCE_SECONDS,
        }
    }
}

/// Platform cache directory for activity files
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(cache::APP_DIR_NAME)
        .join(cache::FILES_DIR_NAME)
}

fn default_config_path() -> String {
    dirs::config_dir()
        .map(|p| p.join(cache::APP_DIR_NAME).join("config.toml"))
        .unwrap_or_else(|| "config.toml".into())
        .to_string_lossy()
        .to_string()
}

impl Config {
    /// Load from a TOML file, falling back to environment variables when the
    /// file does not exist
    pub fn load(path: Option<String>) -> Result<Self> {
        let config_path = path.unwrap_or_else(default_config_path);

        let config = if Path::new(&config_path).exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config =
                toml::from_str(&content).context("Failed to parse config file")?;
            info!("Configuration loaded from {}", config_path);
            config
        } else {
            if let Err(e) = dotenv::dotenv() {
                warn!("No .env file found or failed to load: {}", e);
            }
            Self::from_env()
        };

        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables only
    pub fn from_env() -> Self {
        Config {
            api: ApiConfig {
                base_url: env_config::api_base(),
                athlete_id: env_config::athlete_id(),
                access_token: env_config::access_token(),
                max_retries: api::DEFAULT_MAX_RETRIES,
            },
            cache: CacheConfig {
                directory: env_config::cache_dir()
                    .map(PathBuf::from)
                    .unwrap_or_else(default_cache_dir),
                max_bytes: env_config::cache_max_bytes(),
            },
            analysis: AnalysisConfig {
                curve_batch_size: env_config::curve_batch_size(),
                ..AnalysisConfig::default()
            },
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_bytes == 0 {
            return Err(anyhow::anyhow!("cache.max_bytes must be greater than zero"));
        }

        if self.analysis.curve_batch_size == 0 {
            return Err(anyhow::anyhow!(
                "analysis.curve_batch_size must be greater than zero"
            ));
        }

        if self.analysis.interval_tolerance_seconds < 0.0 {
            return Err(anyhow::anyhow!(
                "analysis.interval_tolerance_seconds cannot be negative"
            ));
        }

        url::Url::parse(&self.api.base_url).context("Invalid api.base_url")?;

        if self.api.access_token.is_none() {
            warn!("No access token configured; only cached activity files can be analyzed");
        }

        Ok(())
    }

    pub fn save(&self, path: Option<String>) -> Result<()> {
        let config_path = path.unwrap_or_else(default_config_path);

        let parent = Path::new(&config_path)
            .parent()
            .context("Invalid config path")?;
        fs::create_dir_all(parent)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    pub fn summary(&self) -> String {
        format!(
            "TrainingPeaks MCP Configuration:\n\
             - API: {}\n\
             - Athlete: {}\n\
             - Access token: {}\n\
             - Cache directory: {}\n\
             - Cache budget: {} bytes\n\
             - Curve batch size: {}",
            self.api.base_url,
            self.api
                .athlete_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "not set".to_string()),
            if self.api.access_token.is_some() { "Configured" } else { "Missing" },
            self.cache.directory.display(),
            self.cache.max_bytes,
            self.analysis.curve_batch_size
        )
    }
}
