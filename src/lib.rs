// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # TrainingPeaks MCP
//!
//! A Model Context Protocol (MCP) server that turns TrainingPeaks activity
//! files into training analytics.
//!
//! ## Features
//!
//! - **Power-duration curve**: best sustained power per duration, for one
//!   workout or across every ride in a date range
//! - **Aerobic decoupling**: heart-rate-per-watt drift between the halves of
//!   an effort
//! - **Interval comparison**: laps of several workouts aligned side by side
//! - **Activity file cache**: downloaded files kept on disk under a byte
//!   budget with least-recently-used eviction
//!
//! ## Architecture
//!
//! - **Cache**: disk-backed activity file store
//! - **Decoder**: FIT file decoding into samples, laps and sessions
//! - **Intelligence**: the analysis engines, pure functions over decoded data
//! - **Providers**: the TrainingPeaks REST client
//! - **Service**: cache-first orchestration of fetch, decode and analysis
//! - **MCP**: the JSON-RPC tool layer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trainingpeaks_mcp::cache::ActivityFileCache;
//! use trainingpeaks_mcp::config::Config;
//! use trainingpeaks_mcp::decoder::FitDecoder;
//! use trainingpeaks_mcp::providers::create_provider;
//! use trainingpeaks_mcp::service::AnalysisService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let cache = ActivityFileCache::open(&config.cache.directory, config.cache.max_bytes).await?;
//!
//!     let service = AnalysisService::new(
//!         create_provider(&config.api)?,
//!         Arc::new(FitDecoder::new()),
//!         Arc::new(cache),
//!         config.analysis.clone(),
//!     );
//!
//!     let decoupling = service.get_aerobic_decoupling(123456789).await?;
//!     println!("Decoupling: {}% ({})", decoupling.decoupling_percent, decoupling.interpretation);
//!
//!     Ok(())
//! }
//! ```

/// Disk-backed activity file cache
pub mod cache;

/// Configuration management and persistence
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Activity file decoding
pub mod decoder;

/// Analysis engines: best power, decoupling, interval alignment
pub mod intelligence;

/// Structured logging
pub mod logging;

/// Model Context Protocol server implementation
pub mod mcp;

/// Common data models for workouts and decoded activities
pub mod models;

/// Training service client
pub mod providers;

/// Cache-first analysis orchestration
pub mod service;
