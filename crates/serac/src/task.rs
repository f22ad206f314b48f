//! SQL task descriptions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The kind of SQL task being executed.
///
/// The kind drives rendering mode selection, partition level caps, and
/// result validation; every consumer matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Data transformation: literal token substitution, at most two
    /// partition levels, result cardinality validated.
    Transform,
    /// Audit: strict template expansion, exactly four partition levels,
    /// no result validation.
    Audit,
}

impl TaskKind {
    /// The lowercase wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Transform => "transform",
            TaskKind::Audit => "audit",
        }
    }
}

/// One SQL execution task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlTask {
    /// Task kind.
    pub kind: TaskKind,
    /// Pipeline this task belongs to (used in audit paths and logs).
    pub pipeline: String,
    /// Job name, used to name the uploaded rendered SQL.
    pub job_name: String,
    /// Database the statements execute against.
    pub execution_db: String,
    /// Workflow step execution id; only the segment after the final
    /// `:` lands in the rendered-SQL audit path.
    pub step_execution_id: String,
    /// Start timestamp stamped by the trigger (`%Y%m%d%H%M%S`).
    pub start_dttm: String,
    /// Whether a DML statement may legitimately produce no data.
    #[serde(default)]
    pub can_fetch_no_results: bool,
}

impl SqlTask {
    /// The step execution id shortened to its final `:`-separated segment.
    pub fn short_execution_id(&self) -> &str {
        self.step_execution_id
            .rsplit_once(':')
            .map(|(_, id)| id)
            .unwrap_or(&self.step_execution_id)
    }
}

/// Properties of the table a task writes into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationTableProperties {
    /// Destination table name.
    pub table_name: String,
    /// When true, all objects under the resolved partition path(s) are
    /// deleted before execution: replace, not append.
    #[serde(default)]
    pub overwrite_data: bool,
    /// Bucket holding the table data.
    pub table_bucket: String,
    /// Database prefix rooting the table path.
    pub table_db: String,
    /// Ordered partition-key template; keys with placeholder values,
    /// resolved per task kind at purge time. Empty means the table is
    /// unpartitioned and overwrite purges the whole table path.
    #[serde(default)]
    pub table_partition: IndexMap<String, String>,
    /// Whether downstream compaction was requested. Accepted for
    /// compatibility; result layout is owned by the query service.
    #[serde(default)]
    pub compact: bool,
}

impl DestinationTableProperties {
    /// The table's root path under its database.
    pub fn table_path(&self) -> String {
        format!("{}/{}", self.table_db, self.table_name)
    }
}
