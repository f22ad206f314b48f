//! Batch readiness detection.
//!
//! A batch is ready when every expected file for a pipeline has arrived
//! under `incoming_path/<exec-date>/`: exactly one incoming file per
//! expected prefix, no more, no fewer. On success the detector writes a
//! zero-length control-file marker whose presence signals downstream
//! stages, and a dependency cascade can fan markers out to dependent
//! pipelines.
//!
//! The detector never overwrites an existing marker: re-running a batch
//! requires removing the marker first.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use icefall_common::config::{Manifest, PipelineConfig};
use icefall_common::StorageProviderRef;

use crate::descriptor::FileDescriptor;
use crate::error::ReadinessError;
use crate::metrics::{InternalEvent, MarkerCreated};

/// Execution mode for a readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckMode {
    /// Sweeping the pipeline's own incoming folder.
    SelfCheck,
    /// Cascading from a parent pipeline's completion.
    Dependency,
}

/// Request to cascade readiness from a parent pipeline's completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    /// Type identifier of the pipeline to check.
    pub pipeline_type: String,
    /// Execution date the parent completed for.
    pub exec_date: NaiveDate,
}

/// Outcome of a readiness check for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessOutcome {
    pub pipeline_type: String,
    /// Whether the batch was complete and markers were written.
    pub ready: bool,
    /// Marker keys created, in write order.
    pub markers_created: Vec<String>,
}

/// Readiness detector over one landing bucket.
pub struct ReadinessDetector {
    storage: StorageProviderRef,
    manifest: Arc<Manifest>,
}

impl ReadinessDetector {
    pub fn new(storage: StorageProviderRef, manifest: Arc<Manifest>) -> Self {
        Self { storage, manifest }
    }

    /// Self-check every registered pipeline for the given execution date.
    ///
    /// Pipelines whose batch is complete (and which carry a daily
    /// schedule) get their own control-file marker written.
    pub async fn sweep(&self, exec_date: NaiveDate) -> Result<Vec<ReadinessOutcome>, ReadinessError> {
        let mut outcomes = Vec::new();

        for (control_file, pipeline) in self.manifest.pipelines() {
            info!(
                pipeline = %pipeline.pipeline_type,
                %exec_date,
                "Verifying batch readiness"
            );
            let ready = self
                .check(control_file, pipeline, exec_date, CheckMode::SelfCheck)
                .await?;

            let mut markers_created = Vec::new();
            if ready {
                let marker = incoming_key(pipeline, exec_date, control_file);
                self.storage.put_empty(&marker).await?;
                info!(marker = %marker, "Created control file: all conditions met");
                MarkerCreated {
                    pipeline: pipeline.pipeline_type.clone(),
                }
                .emit();
                markers_created.push(marker);
            }

            outcomes.push(ReadinessOutcome {
                pipeline_type: pipeline.pipeline_type.clone(),
                ready,
                markers_created,
            });
        }

        Ok(outcomes)
    }

    /// Cascade a readiness check from a parent pipeline's completion.
    ///
    /// On success, writes every marker in the pipeline's dependent-marker
    /// list followed by a `<type>.completed` marker, in that order. An
    /// unknown pipeline type is fatal.
    pub async fn cascade(
        &self,
        request: &DependencyRequest,
    ) -> Result<ReadinessOutcome, ReadinessError> {
        let (control_file, pipeline) = self.manifest.by_pipeline_type(&request.pipeline_type)?;

        let ready = self
            .check(control_file, pipeline, request.exec_date, CheckMode::Dependency)
            .await?;

        let mut markers_created = Vec::new();
        if ready {
            for marker_name in &pipeline.dependent_markers {
                let marker = incoming_key(pipeline, request.exec_date, marker_name);
                self.storage.put_empty(&marker).await?;
                info!(marker = %marker, "Created dependent pipeline marker");
                markers_created.push(marker);
            }

            let completed = incoming_key(
                pipeline,
                request.exec_date,
                &format!("{}.completed", pipeline.pipeline_type),
            );
            self.storage.put_empty(&completed).await?;
            info!(marker = %completed, "Created completion marker");
            markers_created.push(completed);

            MarkerCreated {
                pipeline: pipeline.pipeline_type.clone(),
            }
            .emit();
        }

        Ok(ReadinessOutcome {
            pipeline_type: pipeline.pipeline_type.clone(),
            ready,
            markers_created,
        })
    }

    /// Run the match logic for one pipeline.
    async fn check(
        &self,
        control_file: &str,
        pipeline: &PipelineConfig,
        exec_date: NaiveDate,
        mode: CheckMode,
    ) -> Result<bool, ReadinessError> {
        let folder = format!("{}/{exec_date}/", pipeline.incoming_path);
        let listed = self.storage.list_with_prefix(&folder).await?;

        // Work with names relative to the date folder.
        let incoming: Vec<&str> = listed
            .iter()
            .filter_map(|key| key.strip_prefix(folder.as_str()))
            .filter(|name| !name.is_empty())
            .collect();

        if incoming.is_empty() {
            info!(folder = %folder, "Incoming folder not present or empty");
        }

        // An existing marker means this batch already completed; never
        // overwrite it. Only the pipeline's own sweep checks this.
        if mode == CheckMode::SelfCheck && incoming.iter().any(|name| *name == control_file) {
            info!(
                marker = %control_file,
                "Marker already present; manually remove it to rerun"
            );
            return Ok(false);
        }

        let descriptor = FileDescriptor::load(
            &self.storage,
            &self.manifest.settings.descriptor_prefix,
            &pipeline.pipeline_type,
        )
        .await?;
        let expected = descriptor.prefixes();

        // Each incoming file counts once, against the first expected
        // prefix it contains. Success is an exact count match: a missing
        // file or an extra matching file both fail the batch.
        let mut matched = 0usize;
        for name in &incoming {
            for prefix in &expected {
                if name.contains(prefix) {
                    matched += 1;
                    break;
                }
            }
        }
        debug!(
            matched,
            expected = expected.len(),
            "Incoming files matched against expected prefixes"
        );

        if matched != expected.len() {
            info!(
                pipeline = %pipeline.pipeline_type,
                matched,
                expected = expected.len(),
                "Marker not created: incoming files do not match expected prefixes"
            );
            return Ok(false);
        }

        // Monthly/yearly-only pipelines never emit a marker from this
        // path; their work is driven by their own schedules.
        if !pipeline.has_daily_schedule() {
            info!(
                pipeline = %pipeline.pipeline_type,
                "All files present but cadence not met; marker not created"
            );
            return Ok(false);
        }

        Ok(true)
    }
}

fn incoming_key(pipeline: &PipelineConfig, exec_date: NaiveDate, name: &str) -> String {
    format!("{}/{exec_date}/{name}", pipeline.incoming_path)
}
