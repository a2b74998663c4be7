// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Application constants and environment-based configuration values.
//! This module provides both hardcoded constants and environment variable configuration.

use std::env;

/// Protocol-related constants
pub mod protocol {
    /// MCP protocol revision implemented by the tool layer
    pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

    /// JSON-RPC version (standard, not configurable)
    pub const JSONRPC_VERSION: &str = "2.0";

    pub const SERVER_NAME: &str = "trainingpeaks-mcp";

    /// Server version from Cargo.toml
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Activity file cache
pub mod cache {
    /// Default byte budget: 500 MiB
    pub const DEFAULT_MAX_BYTES: u64 = 500 * 1024 * 1024;

    /// Extension of cached activity files
    pub const FILE_EXTENSION: &str = "fit";

    /// Directory name used below the platform cache/config dirs
    pub const APP_DIR_NAME: &str = "trainingpeaks-mcp";

    /// Sub-directory holding the raw activity files
    pub const FILES_DIR_NAME: &str = "activity-files";
}

/// Analysis engine parameters
pub mod analysis {
    /// Workouts fetched and decoded concurrently per curve batch
    pub const CURVE_BATCH_SIZE: usize = 5;

    /// Durations (seconds) used when a caller does not ask for specific ones
    pub const STANDARD_DURATIONS: [u32; 9] = [5, 15, 30, 60, 300, 600, 1200, 1800, 3600];

    /// Default lap duration tolerance (seconds) for interval filtering
    pub const DEFAULT_INTERVAL_TOLERANCE_SECONDS: f64 = 10.0;

    /// Below this absolute drift (%) decoupling is considered minimal
    pub const DECOUPLING_MINIMAL_MAX: f64 = 5.0;

    /// Below this absolute drift (%) decoupling is considered moderate
    pub const DECOUPLING_MODERATE_MAX: f64 = 10.0;

    pub const INTERPRETATION_MINIMAL: &str = "minimal cardiac drift";
    pub const INTERPRETATION_MODERATE: &str = "moderate decoupling";
    pub const INTERPRETATION_HIGH: &str = "high decoupling, aerobic base needs work";
}

/// Training service API
pub mod api {
    /// Default base URL of the training service REST API
    pub const DEFAULT_API_BASE: &str = "https://tpapi.trainingpeaks.com";

    /// Longest date range requested in a single workout listing call
    pub const LIST_CHUNK_DAYS: i64 = 90;

    /// Retries on HTTP 429 before giving up
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Upper bound for a single backoff wait (seconds)
    pub const MAX_BACKOFF_SECONDS: u64 = 30;
}

/// JSON-RPC and MCP error codes
pub mod errors {
    /// Parse error
    pub const ERROR_PARSE: i32 = -32700;

    /// Method not found
    pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid parameters
    pub const ERROR_INVALID_PARAMS: i32 = -32602;

    /// Internal error
    pub const ERROR_INTERNAL_ERROR: i32 = -32603;

    /// Common error messages
    pub const MSG_METHOD_NOT_FOUND: &str = "Method not found";
    pub const MSG_INVALID_PARAMS: &str = "Invalid parameters";
    pub const MSG_PARSE_ERROR: &str = "Parse error";
    pub const MSG_UNKNOWN_TOOL: &str = "Unknown tool";
}

/// Environment-based configuration
pub mod env_config {
    use super::env;

    /// Get access token from environment
    pub fn access_token() -> Option<String> {
        env::var("TP_ACCESS_TOKEN").ok()
    }

    /// Get athlete id from environment
    pub fn athlete_id() -> Option<u64> {
        env::var("TP_ATHLETE_ID").ok().and_then(|v| v.parse().ok())
    }

    /// Get API base URL from environment or default
    pub fn api_base() -> String {
        env::var("TP_API_BASE").unwrap_or_else(|_| super::api::DEFAULT_API_BASE.to_string())
    }

    /// Get cache directory override from environment
    pub fn cache_dir() -> Option<String> {
        env::var("TP_CACHE_DIR").ok()
    }

    /// Get cache byte budget from environment or default
    pub fn cache_max_bytes() -> u64 {
        env::var("TP_CACHE_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(super::cache::DEFAULT_MAX_BYTES)
    }

    /// Get curve batch size from environment or default
    pub fn curve_batch_size() -> usize {
        env::var("TP_CURVE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(super::analysis::CURVE_BATCH_SIZE)
    }

    /// Get log level from environment or default
    pub fn log_level() -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    }
}
