//! Metric events for SQL execution.

use metrics::counter;
use tracing::trace;

pub use icefall_common::metrics::InternalEvent;

/// Event emitted when a target partition is purged before writing.
pub struct PartitionPurged {
    pub objects: u64,
    pub table: String,
}

impl InternalEvent for PartitionPurged {
    fn emit(self) {
        trace!(objects = self.objects, table = %self.table, "Partition purged");
        counter!("serac_partition_objects_purged_total", "table" => self.table)
            .increment(self.objects);
    }
}

/// Event emitted for every statement executed against the query service.
pub struct StatementExecuted {
    pub pipeline: String,
}

impl InternalEvent for StatementExecuted {
    fn emit(self) {
        trace!(pipeline = %self.pipeline, "Statement executed");
        counter!("serac_statements_executed_total", "pipeline" => self.pipeline).increment(1);
    }
}

/// Event emitted when the rendered SQL is uploaded for traceability.
pub struct RenderedSqlUploaded {
    pub pipeline: String,
}

impl InternalEvent for RenderedSqlUploaded {
    fn emit(self) {
        trace!(pipeline = %self.pipeline, "Rendered SQL uploaded");
        counter!("serac_rendered_sql_uploaded_total", "pipeline" => self.pipeline).increment(1);
    }
}
