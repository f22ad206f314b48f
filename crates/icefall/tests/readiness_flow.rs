//! Integration tests for the readiness detector.

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use icefall::{DependencyRequest, ReadinessDetector, ReadinessError};
use icefall_common::config::Manifest;
use icefall_common::storage::local_provider;
use icefall_common::StorageProviderRef;

const MANIFEST_YAML: &str = r#"
settings:
  stage: prod
  landing_db: landing_db_prod
pipelines:
  state_emission_daily.done:
    type: state_emission_daily
    incoming_path: incoming/all_ef_files
    dependent_markers:
      - state_emission_monthly.done
    schedules:
      - cadence: daily
        workflow_parameter: /pipeline/wf-emission-daily
  archive_rollup.done:
    type: archive_rollup
    incoming_path: incoming/archive
    schedules:
      - cadence: monthly
        workflow_parameter: /pipeline/wf-archive-rollup
"#;

struct Harness {
    _temp_dir: TempDir,
    storage: StorageProviderRef,
    detector: ReadinessDetector,
}

fn exec_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn harness() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let storage: StorageProviderRef = Arc::new(local_provider(temp_dir.path()).unwrap());
    let manifest = Arc::new(Manifest::parse(MANIFEST_YAML, exec_date()).unwrap());
    let detector = ReadinessDetector::new(storage.clone(), manifest);

    Harness {
        _temp_dir: temp_dir,
        storage,
        detector,
    }
}

async fn seed_descriptors(harness: &Harness) {
    harness
        .storage
        .put(
            "pipeline_meta/state_emission_daily.json",
            br#"{"expected_files": [
                {"prefix": "utility", "table": "utility_data_in", "partitioned": true},
                {"prefix": "grid", "table": "grid_data_in", "partitioned": true}
            ]}"#
            .to_vec(),
        )
        .await
        .unwrap();
    harness
        .storage
        .put(
            "pipeline_meta/archive_rollup.json",
            br#"{"expected_files": [
                {"prefix": "archive", "table": "archive_data_in", "partitioned": true}
            ]}"#
            .to_vec(),
        )
        .await
        .unwrap();
}

async fn seed_complete_daily_batch(harness: &Harness) {
    harness
        .storage
        .put(
            "incoming/all_ef_files/2024-03-01/state_emission_daily_utility.csv",
            b"u".to_vec(),
        )
        .await
        .unwrap();
    harness
        .storage
        .put(
            "incoming/all_ef_files/2024-03-01/state_emission_daily_grid.csv",
            b"g".to_vec(),
        )
        .await
        .unwrap();
}

fn outcome_for<'a>(
    outcomes: &'a [icefall::ReadinessOutcome],
    pipeline_type: &str,
) -> &'a icefall::ReadinessOutcome {
    outcomes
        .iter()
        .find(|outcome| outcome.pipeline_type == pipeline_type)
        .expect("pipeline outcome present")
}

#[tokio::test]
async fn test_exact_match_creates_marker() {
    let harness = harness();
    seed_descriptors(&harness).await;
    seed_complete_daily_batch(&harness).await;

    let outcomes = harness.detector.sweep(exec_date()).await.unwrap();
    let daily = outcome_for(&outcomes, "state_emission_daily");
    assert!(daily.ready);
    assert_eq!(
        daily.markers_created,
        vec!["incoming/all_ef_files/2024-03-01/state_emission_daily.done".to_string()]
    );

    let marker = harness
        .storage
        .get("incoming/all_ef_files/2024-03-01/state_emission_daily.done")
        .await
        .unwrap();
    assert!(marker.is_empty());
}

#[tokio::test]
async fn test_missing_file_blocks_marker() {
    let harness = harness();
    seed_descriptors(&harness).await;
    // Only one of the two expected files has arrived.
    harness
        .storage
        .put(
            "incoming/all_ef_files/2024-03-01/state_emission_daily_utility.csv",
            b"u".to_vec(),
        )
        .await
        .unwrap();

    let outcomes = harness.detector.sweep(exec_date()).await.unwrap();
    let daily = outcome_for(&outcomes, "state_emission_daily");
    assert!(!daily.ready);
    assert!(
        !harness
            .storage
            .exists("incoming/all_ef_files/2024-03-01/state_emission_daily.done")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_extra_matching_file_blocks_marker() {
    let harness = harness();
    seed_descriptors(&harness).await;
    seed_complete_daily_batch(&harness).await;
    // A second utility file matches the same prefix: N+1 matches.
    harness
        .storage
        .put(
            "incoming/all_ef_files/2024-03-01/state_emission_daily_utility_rerun.csv",
            b"u2".to_vec(),
        )
        .await
        .unwrap();

    let outcomes = harness.detector.sweep(exec_date()).await.unwrap();
    let daily = outcome_for(&outcomes, "state_emission_daily");
    assert!(!daily.ready);
}

#[tokio::test]
async fn test_existing_marker_short_circuits_self_check() {
    let harness = harness();
    seed_descriptors(&harness).await;
    seed_complete_daily_batch(&harness).await;

    // Simulate a prior run's marker, with sentinel content so we can
    // prove it is not rewritten.
    harness
        .storage
        .put(
            "incoming/all_ef_files/2024-03-01/state_emission_daily.done",
            b"sentinel".to_vec(),
        )
        .await
        .unwrap();

    let outcomes = harness.detector.sweep(exec_date()).await.unwrap();
    let daily = outcome_for(&outcomes, "state_emission_daily");
    assert!(!daily.ready);

    let marker = harness
        .storage
        .get("incoming/all_ef_files/2024-03-01/state_emission_daily.done")
        .await
        .unwrap();
    assert_eq!(marker.as_ref(), b"sentinel");
}

#[tokio::test]
async fn test_cadence_gate_blocks_monthly_only_pipeline() {
    let harness = harness();
    seed_descriptors(&harness).await;
    harness
        .storage
        .put(
            "incoming/archive/2024-03-01/archive_dump.csv",
            b"a".to_vec(),
        )
        .await
        .unwrap();

    let outcomes = harness.detector.sweep(exec_date()).await.unwrap();
    let rollup = outcome_for(&outcomes, "archive_rollup");
    assert!(!rollup.ready);
    assert!(
        !harness
            .storage
            .exists("incoming/archive/2024-03-01/archive_rollup.done")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_cascade_writes_markers_in_order() {
    let harness = harness();
    seed_descriptors(&harness).await;
    seed_complete_daily_batch(&harness).await;
    // The pipeline's own marker may already exist when cascading from a
    // parent completion; dependency checks do not short-circuit on it.
    harness
        .storage
        .put_empty("incoming/all_ef_files/2024-03-01/state_emission_daily.done")
        .await
        .unwrap();

    let outcome = harness
        .detector
        .cascade(&DependencyRequest {
            pipeline_type: "state_emission_daily".to_string(),
            exec_date: exec_date(),
        })
        .await
        .unwrap();

    assert!(outcome.ready);
    assert_eq!(
        outcome.markers_created,
        vec![
            "incoming/all_ef_files/2024-03-01/state_emission_monthly.done".to_string(),
            "incoming/all_ef_files/2024-03-01/state_emission_daily.completed".to_string(),
        ]
    );
    for marker in &outcome.markers_created {
        assert!(harness.storage.exists(marker).await.unwrap());
    }
}

#[tokio::test]
async fn test_cascade_unknown_pipeline_type_is_fatal() {
    let harness = harness();
    seed_descriptors(&harness).await;

    let err = harness
        .detector
        .cascade(&DependencyRequest {
            pipeline_type: "ghost_pipeline".to_string(),
            exec_date: exec_date(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ReadinessError::Config { .. }));
}

#[tokio::test]
async fn test_missing_descriptor_is_fatal() {
    let harness = harness();
    // No descriptors seeded; a populated incoming folder forces the
    // descriptor read.
    seed_complete_daily_batch(&harness).await;

    let err = harness.detector.sweep(exec_date()).await.unwrap_err();
    assert!(matches!(err, ReadinessError::Config { .. }));
}
