//! Metric events for ingestion dispatch and readiness detection.
//!
//! All counters carry a `pipeline` label so multi-pipeline deployments
//! can be observed per component.

use metrics::counter;
use tracing::trace;

pub use icefall_common::metrics::InternalEvent;

/// Event emitted when planned files are copied into landing tables.
pub struct FilesCopied {
    pub count: u64,
    pub pipeline: String,
}

impl InternalEvent for FilesCopied {
    fn emit(self) {
        trace!(count = self.count, pipeline = %self.pipeline, "Files copied");
        counter!("icefall_files_copied_total", "pipeline" => self.pipeline).increment(self.count);
    }
}

/// Event emitted when stale objects are purged from a destination partition.
pub struct ObjectsPurged {
    pub count: u64,
    pub table: String,
    pub pipeline: String,
}

impl InternalEvent for ObjectsPurged {
    fn emit(self) {
        trace!(count = self.count, table = %self.table, pipeline = %self.pipeline, "Objects purged");
        counter!("icefall_objects_purged_total", "pipeline" => self.pipeline).increment(self.count);
    }
}

/// Event emitted when a completion marker is created.
pub struct MarkerCreated {
    pub pipeline: String,
}

impl InternalEvent for MarkerCreated {
    fn emit(self) {
        trace!(pipeline = %self.pipeline, "Marker created");
        counter!("icefall_markers_created_total", "pipeline" => self.pipeline).increment(1);
    }
}

/// Event emitted when a workflow execution is started.
pub struct WorkflowTriggerStarted {
    pub workflow: String,
}

impl InternalEvent for WorkflowTriggerStarted {
    fn emit(self) {
        trace!(workflow = %self.workflow, "Workflow trigger started");
        counter!("icefall_workflow_triggers_total", "workflow" => self.workflow).increment(1);
    }
}

/// Event emitted when a trigger is skipped because an execution is RUNNING.
pub struct WorkflowTriggerSkipped {
    pub workflow: String,
}

impl InternalEvent for WorkflowTriggerSkipped {
    fn emit(self) {
        trace!(workflow = %self.workflow, "Workflow trigger skipped");
        counter!("icefall_workflow_triggers_skipped_total", "workflow" => self.workflow)
            .increment(1);
    }
}
