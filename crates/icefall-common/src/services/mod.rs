//! External service boundaries.
//!
//! The components in this workspace depend on three managed services
//! only through the traits defined here: a SQL query service (start a
//! query, wait, return an execution summary), a workflow engine (start
//! an execution, count RUNNING executions), and a parameter store.
//!
//! In-memory implementations live in [`memory`] for local runs and
//! tests, the same way the storage layer carries a local filesystem
//! backend.

pub mod memory;
mod retry;

pub use retry::{retry, RetryPolicy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Final status of a query or workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// The class of SQL statement the query service executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Ddl,
    Dml,
    Utility,
}

/// Execution statistics reported by the query service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueryStatistics {
    /// Bytes of table data the statement scanned. Zero for a DML
    /// statement means it produced no data.
    pub data_scanned_bytes: u64,
    /// Engine-side execution time.
    pub engine_execution_millis: u64,
}

/// Summary returned once a query has run to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExecutionSummary {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub statement_kind: StatementKind,
    pub statistics: QueryStatistics,
}

/// Handle for a workflow execution that was just started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedExecution {
    pub execution_id: String,
    pub started_at: DateTime<Utc>,
}

/// SQL query service: start a query and wait for its completion.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Execute a single statement against the given database and return
    /// its execution summary once it completes.
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
    ) -> Result<QueryExecutionSummary, ServiceError>;
}

/// Workflow engine: start executions and count running ones.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Start a new execution of the named workflow with a JSON input.
    async fn start_execution(
        &self,
        workflow: &str,
        input: &serde_json::Value,
    ) -> Result<StartedExecution, ServiceError>;

    /// The number of currently RUNNING executions of the named workflow.
    ///
    /// Fetched fresh on every call; callers must not cache the result.
    async fn running_executions(&self, workflow: &str) -> Result<usize, ServiceError>;
}

/// Key-value parameter store.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch a parameter value by name.
    async fn get_parameter(&self, name: &str) -> Result<String, ServiceError>;
}
