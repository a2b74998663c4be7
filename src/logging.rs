// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Structured logging setup
//!
//! All output goes to stderr. When the server speaks MCP over stdio, stdout
//! carries nothing but JSON-RPC frames.

use anyhow::Result;
use serde_json::json;
use std::env;
use std::io;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::constants::{env_config, protocol};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level or filter directive (e.g. `info`, `trainingpeaks_mcp=debug`)
    pub level: String,
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Emit span open/close events
    pub include_spans: bool,
    pub service_name: String,
    pub service_version: String,
    /// development, staging or production
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: false,
            include_spans: false,
            service_name: protocol::SERVER_NAME.to_string(),
            service_version: protocol::SERVER_VERSION.to_string(),
            environment: "development".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Read RUST_LOG, LOG_FORMAT, ENVIRONMENT and SERVICE_NAME
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let is_production = environment == "production";

        Self {
            level: env_config::log_level(),
            format: env::var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(LogFormat::Pretty),
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_spans: env::var("LOG_INCLUDE_SPANS").is_ok(),
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| protocol::SERVER_NAME.to_string()),
            service_version: protocol::SERVER_VERSION.to_string(),
            environment,
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Install the global subscriber
    pub fn init(&self) -> Result<()> {
        let env_filter = EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);

        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_span_events(self.span_events());

        match self.format {
            LogFormat::Json => registry.with(layer.json()).try_init()?,
            LogFormat::Pretty => registry.with(layer.with_target(true)).try_init()?,
            LogFormat::Compact => registry.with(layer.compact().with_target(false)).try_init()?,
        }

        self.log_startup_info();
        Ok(())
    }

    fn log_startup_info(&self) {
        let summary = json!({
            "service": {
                "name": self.service_name,
                "version": self.service_version,
                "environment": self.environment
            },
            "logging": {
                "level": self.level,
                "format": format!("{:?}", self.format),
            }
        });

        info!(
            service.name = %self.service_name,
            service.version = %self.service_version,
            environment = %self.environment,
            "TrainingPeaks MCP starting up: {}",
            summary
        );
    }
}

/// Initialize logging from environment
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Structured events shared by the server and the admin tool
pub struct AppLogger;

impl AppLogger {
    pub fn log_tool_call(tool_name: &str, success: bool, duration_ms: u64) {
        info!(
            mcp.tool = %tool_name,
            mcp.success = %success,
            mcp.duration_ms = %duration_ms,
            "MCP tool call"
        );
    }

    /// hit, miss, store, evict, delete
    pub fn log_cache_event(event: &str, workout_id: u64, size_bytes: Option<u64>) {
        debug!(
            cache.event = %event,
            workout.id = %workout_id,
            cache.size_bytes = size_bytes.unwrap_or(0),
            "Activity file cache event"
        );
    }

    pub fn log_analysis_skip(analysis: &str, workout_id: u64, reason: &str) {
        warn!(
            analysis.kind = %analysis,
            workout.id = %workout_id,
            analysis.reason = %reason,
            "Workout skipped"
        );
    }
}
