//! Ingestion dispatch.
//!
//! Triggered once per file-arrival notification for a single object.
//! The dispatcher derives the execution date from the key, builds a
//! copy plan from the pipeline's file descriptor, purges the target
//! partitions, copies the planned files, and hands off to the trigger
//! phase. Every step is a hard precondition for the next; any fatal
//! condition aborts the whole dispatch.

mod trigger;

pub use trigger::TriggerResult;

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use icefall_common::config::{Manifest, Settings};
use icefall_common::services::{ParameterStore, RetryPolicy, WorkflowEngine};
use icefall_common::StorageProviderRef;

use crate::descriptor::FileDescriptor;
use crate::error::DispatchError;
use crate::event::ObjectArrival;
use crate::metrics::{FilesCopied, InternalEvent, ObjectsPurged};

/// One planned relocation of an arrived file into a landing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlanEntry {
    /// Destination landing table.
    pub table: String,
    /// Whether the destination path is partitioned by execution date.
    pub partitioned: bool,
    /// Source bucket and key.
    pub src_bucket: String,
    pub src_key: String,
    /// Destination bucket and key (same bucket namespace).
    pub dest_bucket: String,
    pub dest_key: String,
}

impl CopyPlanEntry {
    /// The destination's parent path, the unit that gets purged.
    pub fn dest_parent(&self) -> &str {
        self.dest_key
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or("")
    }
}

/// Result of one dispatch invocation.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The key had no file extension; treated as a folder-creation
    /// event and ignored.
    IgnoredFolderEvent,
    /// The batch was relocated and the trigger phase ran.
    Dispatched {
        pipeline_type: String,
        exec_date: NaiveDate,
        copied: usize,
        triggers: Vec<TriggerResult>,
    },
}

/// Ingestion dispatcher.
///
/// Stateless across invocations: manifests are injected once, but every
/// listing, descriptor read, and RUNNING-execution count is fetched
/// fresh per dispatch.
pub struct Dispatcher {
    storage: StorageProviderRef,
    manifest: Arc<Manifest>,
    workflow_engine: Arc<dyn WorkflowEngine>,
    parameter_store: Arc<dyn ParameterStore>,
    today: NaiveDate,
    retry_policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        storage: StorageProviderRef,
        manifest: Arc<Manifest>,
        workflow_engine: Arc<dyn WorkflowEngine>,
        parameter_store: Arc<dyn ParameterStore>,
        today: NaiveDate,
    ) -> Self {
        Self {
            storage,
            manifest,
            workflow_engine,
            parameter_store,
            today,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy applied at the workflow-engine boundary.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Handle one file-arrival notification.
    pub async fn dispatch(&self, arrival: &ObjectArrival) -> Result<DispatchOutcome, DispatchError> {
        info!(key = %arrival.key, "Dispatching object arrival");

        if !arrival.has_extension() {
            info!(
                key = %arrival.key,
                "Possible folder creation: no file name in path, ignoring"
            );
            return Ok(DispatchOutcome::IgnoredFolderEvent);
        }

        let exec_date = arrival.exec_date()?;
        let control_file = arrival.key_name();
        let pipeline = self.manifest.by_control_file(control_file)?;

        let incoming = self
            .storage
            .list_with_prefix(&format!("{}/", arrival.key_path()))
            .await?;
        debug!(count = incoming.len(), "Incoming objects at dispatch time");

        let descriptor = FileDescriptor::load(
            &self.storage,
            &self.manifest.settings.descriptor_prefix,
            &pipeline.pipeline_type,
        )
        .await?;

        let plan = build_copy_plan(
            &self.manifest.settings,
            exec_date,
            &arrival.bucket,
            &incoming,
            &descriptor,
        )?;

        // Clean up prior files loaded into the same partition, if any.
        // This runs for every plan entry, whether or not a new object
        // lands there afterward, and deleting an empty prefix is a no-op.
        for entry in &plan {
            let removed = self.storage.delete_prefix(&format!("{}/", entry.dest_parent())).await?;
            info!(
                table = %entry.table,
                partition = %entry.dest_parent(),
                removed,
                "Purged destination partition"
            );
            ObjectsPurged {
                count: removed as u64,
                table: entry.table.clone(),
                pipeline: pipeline.pipeline_type.clone(),
            }
            .emit();
        }

        for entry in &plan {
            self.storage.copy(&entry.src_key, &entry.dest_key).await?;
            info!(
                "Copied {}/{} ==> {}/{}",
                entry.src_bucket, entry.src_key, entry.dest_bucket, entry.dest_key
            );
        }
        FilesCopied {
            count: plan.len() as u64,
            pipeline: pipeline.pipeline_type.clone(),
        }
        .emit();
        info!("In all {} files copied", plan.len());

        let triggers = trigger::run_trigger_phase(
            self.workflow_engine.as_ref(),
            self.parameter_store.as_ref(),
            &self.manifest.settings,
            pipeline,
            exec_date,
            self.today,
            self.retry_policy,
        )
        .await?;

        Ok(DispatchOutcome::Dispatched {
            pipeline_type: pipeline.pipeline_type.clone(),
            exec_date,
            copied: plan.len(),
            triggers,
        })
    }
}

/// Build the copy plan for one dispatch.
///
/// Each live expected-file entry must match exactly one incoming sibling
/// (the first listing match wins); a prefix with zero matches aborts the
/// dispatch. Entries whose prefix carries a to-be-omitted suffix
/// (markers, completion files) are skipped.
pub fn build_copy_plan(
    settings: &Settings,
    exec_date: NaiveDate,
    bucket: &str,
    incoming: &[String],
    descriptor: &FileDescriptor,
) -> Result<Vec<CopyPlanEntry>, DispatchError> {
    let mut plan = Vec::new();

    for expected in &descriptor.expected_files {
        if settings.is_omitted(&expected.prefix) {
            debug!(prefix = %expected.prefix, "Skipping omitted expected file");
            continue;
        }

        let src_key = incoming
            .iter()
            .find(|key| key.contains(expected.prefix.as_str()))
            .ok_or_else(|| DispatchError::ExpectedFileMissing {
                prefix: expected.prefix.clone(),
            })?;

        let basename = src_key.rsplit_once('/').map(|(_, name)| name).unwrap_or(src_key);
        let dest_key = if expected.partitioned {
            format!(
                "{}/{}/exec_date={exec_date}/{basename}",
                settings.landing_db, expected.table
            )
        } else {
            format!("{}/{}/{basename}", settings.landing_db, expected.table)
        };

        plan.push(CopyPlanEntry {
            table: expected.table.clone(),
            partitioned: expected.partitioned,
            src_bucket: bucket.to_string(),
            src_key: src_key.clone(),
            dest_bucket: bucket.to_string(),
            dest_key,
        });
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ExpectedFileEntry;

    fn settings() -> Settings {
        serde_yaml::from_str("landing_db: landing_db_test").unwrap()
    }

    fn descriptor() -> FileDescriptor {
        FileDescriptor {
            expected_files: vec![
                ExpectedFileEntry {
                    prefix: "utility".to_string(),
                    table: "utility_data_in".to_string(),
                    partitioned: true,
                },
                ExpectedFileEntry {
                    prefix: "grid".to_string(),
                    table: "grid_data_in".to_string(),
                    partitioned: false,
                },
            ],
        }
    }

    fn exec_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_plan_partitioned_and_flat_destinations() {
        let incoming = vec![
            "incoming/2024-03-01/state_emission_daily_utility.csv".to_string(),
            "incoming/2024-03-01/state_emission_daily_grid.csv".to_string(),
        ];

        let plan = build_copy_plan(&settings(), exec_date(), "landing", &incoming, &descriptor())
            .unwrap();
        assert_eq!(plan.len(), 2);

        assert_eq!(
            plan[0].dest_key,
            "landing_db_test/utility_data_in/exec_date=2024-03-01/state_emission_daily_utility.csv"
        );
        assert_eq!(
            plan[0].dest_parent(),
            "landing_db_test/utility_data_in/exec_date=2024-03-01"
        );
        assert_eq!(
            plan[1].dest_key,
            "landing_db_test/grid_data_in/state_emission_daily_grid.csv"
        );
    }

    #[test]
    fn test_missing_expected_file_is_fatal() {
        let incoming = vec!["incoming/2024-03-01/state_emission_daily_utility.csv".to_string()];

        let err = build_copy_plan(&settings(), exec_date(), "landing", &incoming, &descriptor())
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ExpectedFileMissing { ref prefix } if prefix == "grid"
        ));
    }

    #[test]
    fn test_omitted_prefixes_skipped() {
        let descriptor = FileDescriptor {
            expected_files: vec![ExpectedFileEntry {
                prefix: "state_emission_daily.done".to_string(),
                table: "ignored".to_string(),
                partitioned: false,
            }],
        };

        let plan = build_copy_plan(&settings(), exec_date(), "landing", &[], &descriptor).unwrap();
        assert!(plan.is_empty());
    }
}
