// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Integration tests for the analysis service
//!
//! The provider and decoder are replaced by in-memory fakes: an "activity
//! file" is just the workout id as bytes, and the fake decoder looks up the
//! decoded content registered for that id.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;
use trainingpeaks_mcp::cache::ActivityFileCache;
use trainingpeaks_mcp::config::AnalysisConfig;
use trainingpeaks_mcp::decoder::{ActivityDecoder, DecodeError};
use trainingpeaks_mcp::intelligence::intervals::LapFilters;
use trainingpeaks_mcp::intelligence::AnalysisError;
use trainingpeaks_mcp::mcp::McpServer;
use trainingpeaks_mcp::models::{DecodedActivity, LapAggregate, Sample, SportType, WorkoutSummary};
use trainingpeaks_mcp::providers::WorkoutProvider;
use trainingpeaks_mcp::service::AnalysisService;

#[derive(Default)]
struct FakeProvider {
    workouts: HashMap<u64, WorkoutSummary>,
    with_file: HashSet<u64>,
    downloads: AtomicUsize,
}

#[async_trait]
impl WorkoutProvider for FakeProvider {
    async fn list_workouts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkoutSummary>> {
        let mut workouts: Vec<WorkoutSummary> = self
            .workouts
            .values()
            .filter(|w| w.date >= start && w.date <= end)
            .cloned()
            .collect();
        workouts.sort_by_key(|w| w.id);
        Ok(workouts)
    }

    async fn fetch_workout(&self, workout_id: u64) -> Result<WorkoutSummary> {
        self.workouts
            .get(&workout_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("workout {} not found", workout_id))
    }

    async fn fetch_activity_bytes(&self, workout_id: u64) -> Result<Option<Vec<u8>>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.with_file.contains(&workout_id) {
            Ok(Some(workout_id.to_le_bytes().to_vec()))
        } else {
            Ok(None)
        }
    }

    fn provider_name(&self) -> &'static str {
        "Fake"
    }
}

#[derive(Default)]
struct FakeDecoder {
    activities: HashMap<u64, DecodedActivity>,
}

impl ActivityDecoder for FakeDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedActivity, DecodeError> {
        let id_bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|_| DecodeError::Malformed("unexpected length".into()))?;
        self.activities
            .get(&u64::from_le_bytes(id_bytes))
            .cloned()
            .ok_or_else(|| DecodeError::Malformed("unknown activity".into()))
    }
}

struct Fixture {
    service: Arc<AnalysisService>,
    provider: Arc<FakeProvider>,
    _temp_dir: TempDir,
}

fn workout(id: u64, day: u32, sport: SportType) -> WorkoutSummary {
    WorkoutSummary {
        id,
        title: format!("Workout {}", id),
        date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
        sport,
        total_time_hours: Some(1.0),
        tss: None,
        distance_meters: None,
    }
}

fn ride(power: &[f64], heart_rate: f64) -> DecodedActivity {
    DecodedActivity {
        records: power
            .iter()
            .map(|p| Sample::new(Some(*p), Some(heart_rate)))
            .collect(),
        ..DecodedActivity::default()
    }
}

fn lap(avg_power: f64, duration: f64) -> LapAggregate {
    LapAggregate {
        avg_power: Some(avg_power),
        max_power: Some(avg_power + 80.0),
        avg_cadence: Some(92.0),
        duration_seconds: Some(duration),
        ..LapAggregate::default()
    }
}

async fn fixture(
    entries: Vec<(WorkoutSummary, Option<DecodedActivity>)>,
    config: AnalysisConfig,
) -> Result<Fixture> {
    let mut provider = FakeProvider::default();
    let mut decoder = FakeDecoder::default();

    for (summary, activity) in entries {
        if let Some(activity) = activity {
            provider.with_file.insert(summary.id);
            decoder.activities.insert(summary.id, activity);
        }
        provider.workouts.insert(summary.id, summary);
    }

    let temp_dir = TempDir::new()?;
    let cache = ActivityFileCache::open(temp_dir.path(), 1_000_000).await?;
    let provider = Arc::new(provider);
    let service = AnalysisService::new(
        provider.clone(),
        Arc::new(decoder),
        Arc::new(cache),
        config,
    );

    Ok(Fixture {
        service: Arc::new(service),
        provider,
        _temp_dir: temp_dir,
    })
}

#[tokio::test]
async fn test_activity_bytes_are_cached_after_first_fetch() -> Result<()> {
    let f = fixture(
        vec![(workout(1, 1, SportType::Bike), Some(ride(&[200.0; 10], 140.0)))],
        AnalysisConfig::default(),
    )
    .await?;

    assert!(f.service.activity_bytes(1).await?.is_some());
    assert!(f.service.cache().contains(1).await);
    assert!(f.service.activity_bytes(1).await?.is_some());

    assert_eq!(f.provider.downloads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_best_power_single_workout() -> Result<()> {
    let power = [100.0, 100.0, 100.0, 200.0, 300.0, 400.0, 300.0, 200.0, 100.0, 100.0];
    let f = fixture(
        vec![(workout(1, 1, SportType::Bike), Some(ride(&power, 140.0)))],
        AnalysisConfig::default(),
    )
    .await?;

    let report = f.service.get_best_power(1, &[3, 60]).await?;
    assert_eq!(report.samples_analyzed, 10);
    assert_eq!(report.results[0].best_power_watts, Some(333));
    assert_eq!(report.results[0].start_offset_seconds, Some(4));
    assert_eq!(report.results[1].best_power_watts, None);
    Ok(())
}

#[tokio::test]
async fn test_best_power_failures_are_descriptive() -> Result<()> {
    let f = fixture(
        vec![
            (workout(1, 1, SportType::Bike), Some(ride(&[0.0; 10], 140.0))),
            (workout(2, 2, SportType::Bike), None),
            (workout(3, 3, SportType::Bike), Some(DecodedActivity::default())),
        ],
        AnalysisConfig::default(),
    )
    .await?;

    assert!(matches!(
        f.service.get_best_power(1, &[]).await,
        Err(AnalysisError::NoPowerData)
    ));
    assert!(matches!(
        f.service.get_best_power(2, &[]).await,
        Err(AnalysisError::FileNotFound(2))
    ));
    assert!(matches!(
        f.service.get_best_power(3, &[]).await,
        Err(AnalysisError::NoRecordData)
    ));
    Ok(())
}

#[tokio::test]
async fn test_decoupling_from_service() -> Result<()> {
    let mut activity = ride(&[200.0; 600], 140.0);
    for sample in activity.records.iter_mut().skip(300) {
        sample.heart_rate = Some(154.0);
    }
    let f = fixture(
        vec![(workout(1, 1, SportType::Bike), Some(activity))],
        AnalysisConfig::default(),
    )
    .await?;

    let result = f.service.get_aerobic_decoupling(1).await?;
    assert_eq!(result.decoupling_percent, 10.0);
    assert_eq!(result.interpretation, "high decoupling, aerobic base needs work");
    Ok(())
}

#[tokio::test]
async fn test_power_curve_skips_and_filters() -> Result<()> {
    let config = AnalysisConfig {
        curve_batch_size: 2,
        ..AnalysisConfig::default()
    };
    let f = fixture(
        vec![
            (workout(1, 1, SportType::Bike), Some(ride(&[250.0; 40], 140.0))),
            (workout(2, 2, SportType::Bike), Some(ride(&[300.0; 10], 150.0))),
            (workout(3, 3, SportType::Bike), None),
            (workout(4, 4, SportType::Bike), Some(ride(&[0.0; 40], 120.0))),
            (workout(5, 5, SportType::Run), Some(ride(&[900.0; 40], 160.0))),
            (workout(6, 6, SportType::Bike), Some(ride(&[800.0; 40], 170.0))),
        ],
        config,
    )
    .await?;

    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let excluded: HashSet<u64> = [6].into_iter().collect();

    let curve = f
        .service
        .power_duration_curve_for_range(start, end, &[30, 5, 15], &excluded)
        .await?;

    assert_eq!(curve.workouts_analyzed, 2);
    assert_eq!(curve.workouts_skipped, 2);
    assert!(curve
        .warnings
        .iter()
        .any(|w| w.contains("workout 3") && w.contains("no file available")));
    assert!(curve.warnings.iter().any(|w| w.contains("workout 4") && w.contains("no power data")));

    let durations: Vec<u32> = curve.curve.iter().map(|p| p.duration_seconds).collect();
    assert_eq!(durations, vec![5, 15, 30]);

    // Workout 2 is stronger but only 10 samples long
    assert_eq!(curve.curve[0].workout_id, 2);
    assert_eq!(curve.curve[0].best_power_watts, 300);
    assert_eq!(curve.curve[2].workout_id, 1);
    assert_eq!(curve.curve[2].label, "30s");
    Ok(())
}

#[tokio::test]
async fn test_compare_intervals_aligns_and_warns() -> Result<()> {
    let with_laps = |laps: Vec<LapAggregate>| DecodedActivity {
        laps,
        ..DecodedActivity::default()
    };
    let f = fixture(
        vec![
            (workout(1, 1, SportType::Bike), Some(with_laps(vec![lap(280.0, 300.0)]))),
            (
                workout(2, 2, SportType::Bike),
                Some(with_laps(vec![lap(290.0, 300.0), lap(300.0, 300.0)])),
            ),
            (workout(3, 3, SportType::Bike), Some(with_laps(vec![lap(285.0, 305.0)]))),
            (workout(4, 4, SportType::Bike), None),
        ],
        AnalysisConfig::default(),
    )
    .await?;

    let comparison = f
        .service
        .compare_intervals(&[1, 2, 3, 4], LapFilters::default())
        .await;

    assert_eq!(comparison.rows.len(), 2);
    assert!(comparison.rows.iter().all(|r| r.values.len() == 4));
    assert_eq!(comparison.rows[1].values[0].avg_power, None);
    assert_eq!(comparison.rows[1].values[1].avg_power, Some(300.0));
    assert_eq!(comparison.warnings, vec!["workout 4: no file available".to_string()]);

    let summary_4 = &comparison.workouts[3];
    assert_eq!(summary_4.lap_count, 0);
    assert_eq!(summary_4.avg_power_mean, None);
    assert_eq!(summary_4.workout_title.as_deref(), Some("Workout 4"));

    let filtered = f
        .service
        .compare_intervals(
            &[1, 2, 3],
            LapFilters {
                min_power: Some(288.0),
                ..LapFilters::default()
            },
        )
        .await;
    assert_eq!(filtered.rows.len(), 2);
    assert_eq!(filtered.workouts[0].lap_count, 0);
    assert_eq!(filtered.workouts[1].lap_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_mcp_tool_round_trip() -> Result<()> {
    let f = fixture(
        vec![(workout(1, 1, SportType::Bike), Some(ride(&[0.0; 10], 0.0)))],
        AnalysisConfig::default(),
    )
    .await?;
    let server = McpServer::new(f.service.clone());

    let response = server
        .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .await
        .expect("request with id gets a response");
    let json: Value = serde_json::from_str(&response)?;
    assert_eq!(json["result"]["tools"].as_array().unwrap().len(), 7);

    // Analysis errors are tool results, not protocol errors
    let response = server
        .handle_message(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_aerobic_decoupling","arguments":{"workout_id":1}}}"#,
        )
        .await
        .unwrap();
    let json: Value = serde_json::from_str(&response)?;
    assert_eq!(json["result"]["isError"], true);
    assert!(json["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("no valid data"));

    let response = server
        .handle_message(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_cache_stats","arguments":{}}}"#,
        )
        .await
        .unwrap();
    let json: Value = serde_json::from_str(&response)?;
    let text = json["result"]["content"][0]["text"].as_str().unwrap();
    let stats: Value = serde_json::from_str(text)?;
    assert_eq!(stats["entry_count"], 1);

    // Notifications are never answered
    assert!(server
        .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());

    let response = server
        .handle_message(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_best_power","arguments":{}}}"#,
        )
        .await
        .unwrap();
    let json: Value = serde_json::from_str(&response)?;
    assert_eq!(json["error"]["code"], -32602);

    let response = server.handle_message("not json").await.unwrap();
    let json: Value = serde_json::from_str(&response)?;
    assert_eq!(json["error"]["code"], -32700);
    Ok(())
}
