// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use trainingpeaks_mcp::{cache::ActivityFileCache, config::Config, logging};

#[derive(Parser)]
#[command(name = "cache-admin")]
#[command(about = "Inspect and prune the TrainingPeaks activity file cache")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show entry count, size and location
    Stats,
    /// Remove every cached file
    Clear,
    /// Remove one workout's cached file
    Delete {
        /// Workout identifier
        workout_id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config)?;
    let cache = ActivityFileCache::open(&config.cache.directory, config.cache.max_bytes)
        .await
        .context("Failed to open activity file cache")?;

    match cli.command {
        Commands::Stats => {
            let stats = cache.stats().await;
            println!("Location:  {}", stats.location);
            println!("Entries:   {}", stats.entry_count);
            println!(
                "Size:      {} / {} bytes ({:.1}%)",
                stats.total_bytes,
                stats.max_bytes,
                stats.total_bytes as f64 / stats.max_bytes as f64 * 100.0
            );
        }
        Commands::Clear => {
            let summary = cache.clear().await;
            info!("Cleared {} files ({} bytes)", summary.count, summary.bytes);
            println!("Removed {} files, freed {} bytes", summary.count, summary.bytes);
        }
        Commands::Delete { workout_id } => {
            if cache.delete(workout_id).await {
                println!("Removed cached file for workout {}", workout_id);
            } else {
                println!("Workout {} is not cached", workout_id);
            }
        }
    }

    Ok(())
}
