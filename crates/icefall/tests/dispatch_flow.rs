//! Integration tests for the ingestion dispatcher.
//!
//! These run the real storage provider against a local filesystem root
//! and the in-memory workflow engine / parameter store.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use icefall::{DispatchError, DispatchOutcome, Dispatcher, ObjectArrival, TriggerResult};
use icefall_common::config::Manifest;
use icefall_common::services::memory::{InMemoryParameterStore, InMemoryWorkflowEngine};
use icefall_common::services::RetryPolicy;
use icefall_common::storage::local_provider;
use icefall_common::{ServiceError, StorageProviderRef};

const MANIFEST_YAML: &str = r#"
settings:
  stage: prod
  landing_db: landing_db_prod
pipelines:
  state_emission_daily.done:
    type: state_emission_daily
    incoming_path: incoming/all_ef_files
    schedules:
      - cadence: daily
        monthly: 2024-03-02
        workflow_parameter: /pipeline/wf-emission-daily
    runtime_sql_params:
      param_landing_db_name: landing_db_prod
      param_processed_db_name: processed_db_prod
  silent_ingest.done:
    type: silent_ingest
    incoming_path: incoming/silent
    trigger_workflow: false
"#;

struct Harness {
    _temp_dir: TempDir,
    storage: StorageProviderRef,
    engine: Arc<InMemoryWorkflowEngine>,
    dispatcher: Dispatcher,
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn harness() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let storage: StorageProviderRef = Arc::new(local_provider(temp_dir.path()).unwrap());
    let manifest = Arc::new(Manifest::parse(MANIFEST_YAML, today()).unwrap());
    let engine = Arc::new(InMemoryWorkflowEngine::new());
    let parameters = Arc::new(
        InMemoryParameterStore::new()
            .with_parameter("/pipeline/wf-emission-daily", "wf-emission-daily-prod"),
    );

    let dispatcher = Dispatcher::new(
        storage.clone(),
        manifest,
        engine.clone(),
        parameters,
        today(),
    )
    .with_retry_policy(RetryPolicy {
        attempts: 2,
        backoff: Duration::from_millis(1),
    });

    Harness {
        _temp_dir: temp_dir,
        storage,
        engine,
        dispatcher,
    }
}

async fn seed_batch(harness: &Harness) {
    harness
        .storage
        .put(
            "incoming/all_ef_files/2024-03-01/state_emission_daily_utility.csv",
            b"utility rows".to_vec(),
        )
        .await
        .unwrap();
    harness
        .storage
        .put_empty("incoming/all_ef_files/2024-03-01/state_emission_daily.done")
        .await
        .unwrap();
    harness
        .storage
        .put(
            "pipeline_meta/state_emission_daily.json",
            br#"{"expected_files": [
                {"prefix": "utility", "table": "utility_data_in", "partitioned": true}
            ]}"#
            .to_vec(),
        )
        .await
        .unwrap();
}

fn done_arrival() -> ObjectArrival {
    ObjectArrival::new(
        "landing",
        "incoming/all_ef_files/2024-03-01/state_emission_daily.done",
    )
}

#[tokio::test]
async fn test_end_to_end_dispatch() {
    let harness = harness();
    seed_batch(&harness).await;

    // A stale object from a prior load of the same partition.
    harness
        .storage
        .put(
            "landing_db_prod/utility_data_in/exec_date=2024-03-01/old_load.csv",
            b"stale".to_vec(),
        )
        .await
        .unwrap();

    let outcome = harness.dispatcher.dispatch(&done_arrival()).await.unwrap();

    match outcome {
        DispatchOutcome::Dispatched {
            pipeline_type,
            exec_date,
            copied,
            triggers,
        } => {
            assert_eq!(pipeline_type, "state_emission_daily");
            assert_eq!(exec_date, today());
            assert_eq!(copied, 1);
            assert!(matches!(triggers[0], TriggerResult::Started { .. }));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The stale object was purged, the new file copied.
    let partition = harness
        .storage
        .list_with_prefix("landing_db_prod/utility_data_in/exec_date=2024-03-01/")
        .await
        .unwrap();
    assert_eq!(
        partition,
        vec![
            "landing_db_prod/utility_data_in/exec_date=2024-03-01/state_emission_daily_utility.csv"
                .to_string()
        ]
    );

    // Exactly one workflow execution started, with the cadence payload.
    let started = harness.engine.started();
    assert_eq!(started.len(), 1);
    let (workflow, payload) = &started[0];
    assert_eq!(workflow, "wf-emission-daily-prod");
    assert_eq!(payload["date"], "2024-03-01");
    assert_eq!(payload["pipeline_type"], "state_emission_daily");
    assert_eq!(payload["monthly"], "false");
    assert_eq!(payload["env"], "prod");
}

#[tokio::test]
async fn test_dispatch_twice_converges() {
    let harness = harness();
    seed_batch(&harness).await;

    harness.dispatcher.dispatch(&done_arrival()).await.unwrap();
    harness.dispatcher.dispatch(&done_arrival()).await.unwrap();

    // Purge-before-copy makes re-dispatch converge to one object.
    let partition = harness
        .storage
        .list_with_prefix("landing_db_prod/utility_data_in/exec_date=2024-03-01/")
        .await
        .unwrap();
    assert_eq!(partition.len(), 1);
}

#[tokio::test]
async fn test_folder_creation_event_ignored() {
    let harness = harness();
    let arrival = ObjectArrival::new("landing", "incoming/all_ef_files/2024-03-01");

    let outcome = harness.dispatcher.dispatch(&arrival).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::IgnoredFolderEvent));
    assert!(harness.engine.started().is_empty());
}

#[tokio::test]
async fn test_unknown_control_file_is_fatal() {
    let harness = harness();
    let arrival = ObjectArrival::new("landing", "incoming/all_ef_files/2024-03-01/mystery.done");

    let err = harness.dispatcher.dispatch(&arrival).await.unwrap_err();
    assert!(matches!(err, DispatchError::Config { .. }));
}

#[tokio::test]
async fn test_missing_date_is_fatal() {
    let harness = harness();
    let arrival = ObjectArrival::new("landing", "incoming/all_ef_files/state_emission_daily.done");

    let err = harness.dispatcher.dispatch(&arrival).await.unwrap_err();
    assert!(matches!(err, DispatchError::Content { .. }));
}

#[tokio::test]
async fn test_missing_expected_file_is_fatal() {
    let harness = harness();
    seed_batch(&harness).await;

    // Descriptor now also expects a grid file that never arrived.
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

    let err = harness.dispatcher.dispatch(&done_arrival()).await.unwrap_err();
    assert!(matches!(err, DispatchError::ExpectedFileMissing { .. }));

    // Nothing was triggered.
    assert!(harness.engine.started().is_empty());
}

#[tokio::test]
async fn test_single_flight_skips_when_running() {
    let harness = harness();
    seed_batch(&harness).await;
    harness.engine.set_running("wf-emission-daily-prod", 1);

    let outcome = harness.dispatcher.dispatch(&done_arrival()).await.unwrap();
    match outcome {
        DispatchOutcome::Dispatched { triggers, .. } => {
            assert_eq!(
                triggers,
                vec![TriggerResult::SkippedRunning {
                    workflow: "wf-emission-daily-prod".to_string()
                }]
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(harness.engine.started().is_empty());
}

#[tokio::test]
async fn test_trigger_disabled_pipeline() {
    let harness = harness();
    harness
        .storage
        .put("incoming/silent/2024-03-01/silent_data.csv", b"rows".to_vec())
        .await
        .unwrap();
    harness
        .storage
        .put_empty("incoming/silent/2024-03-01/silent_ingest.done")
        .await
        .unwrap();
    harness
        .storage
        .put(
            "pipeline_meta/silent_ingest.json",
            br#"{"expected_files": [
                {"prefix": "silent_data", "table": "silent_data_in", "partitioned": true}
            ]}"#
            .to_vec(),
        )
        .await
        .unwrap();

    let arrival = ObjectArrival::new("landing", "incoming/silent/2024-03-01/silent_ingest.done");
    let outcome = harness.dispatcher.dispatch(&arrival).await.unwrap();

    match outcome {
        DispatchOutcome::Dispatched { copied, triggers, .. } => {
            assert_eq!(copied, 1);
            assert_eq!(triggers, vec![TriggerResult::Disabled]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(harness.engine.started().is_empty());
}

#[tokio::test]
async fn test_workflow_engine_outage_surfaces_after_retries() {
    let harness = harness();
    seed_batch(&harness).await;
    harness.engine.fail_next(10);

    let err = harness.dispatcher.dispatch(&done_arrival()).await.unwrap_err();
    match err {
        DispatchError::Service {
            source: ServiceError::RetriesExhausted { attempts, .. },
        } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {other}"),
    }

    // Files were still relocated before the trigger failed; re-driving
    // the dispatch is safe because the purge re-runs first.
    let partition = harness
        .storage
        .list_with_prefix("landing_db_prod/utility_data_in/exec_date=2024-03-01/")
        .await
        .unwrap();
    assert_eq!(partition.len(), 1);
}
