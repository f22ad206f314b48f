//! In-memory service implementations.
//!
//! These back local runs and tests, the same way the storage layer runs
//! against a local filesystem. State lives behind mutexes so a single
//! instance can be shared across components in one invocation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ServiceError;

use super::{
    ExecutionStatus, ParameterStore, QueryExecutionSummary, QueryService, QueryStatistics,
    StartedExecution, StatementKind, WorkflowEngine,
};

/// In-memory workflow engine.
///
/// Records every started execution and serves a configurable RUNNING
/// count per workflow. Failures can be injected to exercise the retry
/// path.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowEngine {
    running: Mutex<HashMap<String, usize>>,
    started: Mutex<Vec<(String, serde_json::Value)>>,
    failures_remaining: Mutex<usize>,
}

impl InMemoryWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RUNNING-execution count reported for a workflow.
    pub fn set_running(&self, workflow: &str, count: usize) {
        self.running
            .lock()
            .expect("running lock")
            .insert(workflow.to_string(), count);
    }

    /// Make the next `count` calls fail with a workflow-engine error.
    pub fn fail_next(&self, count: usize) {
        *self.failures_remaining.lock().expect("failures lock") = count;
    }

    /// Snapshot of every started execution (workflow, input).
    pub fn started(&self) -> Vec<(String, serde_json::Value)> {
        self.started.lock().expect("started lock").clone()
    }

    fn consume_failure(&self) -> Result<(), ServiceError> {
        let mut remaining = self.failures_remaining.lock().expect("failures lock");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ServiceError::Workflow {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn start_execution(
        &self,
        workflow: &str,
        input: &serde_json::Value,
    ) -> Result<StartedExecution, ServiceError> {
        self.consume_failure()?;
        let mut started = self.started.lock().expect("started lock");
        started.push((workflow.to_string(), input.clone()));
        Ok(StartedExecution {
            execution_id: format!("exec-{:06}", started.len()),
            started_at: Utc::now(),
        })
    }

    async fn running_executions(&self, workflow: &str) -> Result<usize, ServiceError> {
        self.consume_failure()?;
        Ok(self
            .running
            .lock()
            .expect("running lock")
            .get(workflow)
            .copied()
            .unwrap_or(0))
    }
}

/// In-memory query service.
///
/// Executes nothing; records every statement and returns either a
/// scripted summary (FIFO) or a default one inferred from the statement
/// text.
#[derive(Debug, Default)]
pub struct InMemoryQueryService {
    executed: Mutex<Vec<(String, String)>>,
    scripted: Mutex<Vec<QueryExecutionSummary>>,
}

impl InMemoryQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a summary to be returned for the next statement.
    pub fn push_summary(&self, summary: QueryExecutionSummary) {
        self.scripted.lock().expect("scripted lock").push(summary);
    }

    /// Snapshot of every executed statement (sql, database).
    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().expect("executed lock").clone()
    }

    fn infer_kind(sql: &str) -> StatementKind {
        let head = sql.trim_start().to_ascii_uppercase();
        if head.starts_with("INSERT")
            || head.starts_with("SELECT")
            || head.starts_with("UPDATE")
            || head.starts_with("MERGE")
            || head.starts_with("UNLOAD")
        {
            StatementKind::Dml
        } else if head.starts_with("CREATE")
            || head.starts_with("ALTER")
            || head.starts_with("DROP")
            || head.starts_with("MSCK")
        {
            StatementKind::Ddl
        } else {
            StatementKind::Utility
        }
    }
}

#[async_trait]
impl QueryService for InMemoryQueryService {
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
    ) -> Result<QueryExecutionSummary, ServiceError> {
        let mut executed = self.executed.lock().expect("executed lock");
        executed.push((sql.to_string(), database.to_string()));
        let execution_id = format!("q-{:06}", executed.len());
        drop(executed);

        let mut scripted = self.scripted.lock().expect("scripted lock");
        if !scripted.is_empty() {
            return Ok(scripted.remove(0));
        }

        Ok(QueryExecutionSummary {
            execution_id,
            status: ExecutionStatus::Succeeded,
            statement_kind: Self::infer_kind(sql),
            statistics: QueryStatistics {
                data_scanned_bytes: 1024,
                engine_execution_millis: 10,
            },
        })
    }
}

/// In-memory parameter store.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    parameters: Mutex<HashMap<String, String>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with_parameter(self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&self, name: &str, value: &str) {
        self.parameters
            .lock()
            .expect("parameters lock")
            .insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ServiceError> {
        self.parameters
            .lock()
            .expect("parameters lock")
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::ParameterNotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workflow_engine_records_and_counts() {
        let engine = InMemoryWorkflowEngine::new();
        assert_eq!(engine.running_executions("wf-a").await.unwrap(), 0);

        engine.set_running("wf-a", 1);
        assert_eq!(engine.running_executions("wf-a").await.unwrap(), 1);

        let handle = engine
            .start_execution("wf-b", &serde_json::json!({"date": "2024-03-01"}))
            .await
            .unwrap();
        assert_eq!(handle.execution_id, "exec-000001");

        let started = engine.started();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].0, "wf-b");
    }

    #[tokio::test]
    async fn test_workflow_engine_failure_injection() {
        let engine = InMemoryWorkflowEngine::new();
        engine.fail_next(1);
        assert!(engine.running_executions("wf").await.is_err());
        assert!(engine.running_executions("wf").await.is_ok());
    }

    #[tokio::test]
    async fn test_query_service_infers_statement_kind() {
        let service = InMemoryQueryService::new();

        let summary = service
            .start_query("INSERT INTO t SELECT 1", "db")
            .await
            .unwrap();
        assert_eq!(summary.statement_kind, StatementKind::Dml);

        let summary = service.start_query("create table t (a int)", "db").await.unwrap();
        assert_eq!(summary.statement_kind, StatementKind::Ddl);

        assert_eq!(service.executed().len(), 2);
    }

    #[tokio::test]
    async fn test_query_service_scripted_summary() {
        let service = InMemoryQueryService::new();
        service.push_summary(QueryExecutionSummary {
            execution_id: "q-zero".to_string(),
            status: ExecutionStatus::Succeeded,
            statement_kind: StatementKind::Dml,
            statistics: QueryStatistics::default(),
        });

        let summary = service.start_query("INSERT INTO t SELECT 1", "db").await.unwrap();
        assert_eq!(summary.execution_id, "q-zero");
        assert_eq!(summary.statistics.data_scanned_bytes, 0);
    }

    #[tokio::test]
    async fn test_parameter_store() {
        let store =
            InMemoryParameterStore::new().with_parameter("/pipeline/wf-daily", "wf-daily-prod");
        assert_eq!(
            store.get_parameter("/pipeline/wf-daily").await.unwrap(),
            "wf-daily-prod"
        );
        let err = store.get_parameter("/missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::ParameterNotFound { .. }));
    }
}
