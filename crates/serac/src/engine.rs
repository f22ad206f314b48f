//! Query execution engine.
//!
//! Drives one SQL task end to end: render, upload the rendered SQL for
//! traceability, purge target partitions when overwrite is requested,
//! then execute the statements sequentially and validate their results.
//!
//! The rendered SQL is uploaded *before* execution so the audit trail
//! survives a failed run. The purge and the writes are separate object
//! store operations with no transaction around them; a crash in between
//! leaves the partition empty until the task is re-driven.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use icefall_common::error::ContentError;
use icefall_common::services::{QueryExecutionSummary, QueryService, StatementKind};
use icefall_common::StorageProviderRef;

use crate::error::EngineError;
use crate::guard::check_statement;
use crate::metrics::{InternalEvent, PartitionPurged, RenderedSqlUploaded, StatementExecuted};
use crate::partition::partition_paths;
use crate::render::{merge_audit_params, render_strict, render_transform, resolve_scalar};
use crate::task::{DestinationTableProperties, SqlTask, TaskKind};

/// Report returned after a task ran to completion.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Where the rendered SQL was uploaded.
    pub rendered_sql_path: String,
    /// Statements executed (blank segments excluded).
    pub statements_executed: usize,
    /// Objects removed by the overwrite purge.
    pub purged_objects: usize,
    /// Summary of the final statement, if any ran.
    pub last_summary: Option<QueryExecutionSummary>,
}

/// The execution engine for one asset + table bucket pair.
pub struct QueryEngine {
    assets: StorageProviderRef,
    tables: StorageProviderRef,
    query_service: Arc<dyn QueryService>,
    stage: String,
}

impl QueryEngine {
    /// Create an engine.
    ///
    /// `assets` holds scripts, parameter files, and the rendered-SQL
    /// audit trail; `tables` must address the bucket named by the
    /// destination-table properties handed to [`Self::run`].
    pub fn new(
        assets: StorageProviderRef,
        tables: StorageProviderRef,
        query_service: Arc<dyn QueryService>,
        stage: impl Into<String>,
    ) -> Self {
        Self {
            assets,
            tables,
            query_service,
            stage: stage.into(),
        }
    }

    /// Run one SQL task.
    pub async fn run(
        &self,
        task: &SqlTask,
        dest: &DestinationTableProperties,
        script_key: &str,
        param_keys: &[String],
        runtime_params: &IndexMap<String, String>,
    ) -> Result<ExecutionReport, EngineError> {
        let script = self.read_or_empty(script_key).await?;

        let (rendered, render_params) = match task.kind {
            TaskKind::Audit => {
                let mut documents = Vec::new();
                for key in param_keys {
                    if key.trim().is_empty() {
                        continue;
                    }
                    let raw = self.read_or_empty(key).await?;
                    let document: Value = serde_json::from_str(&raw).map_err(|source| {
                        ContentError::ParamFileParse {
                            path: key.clone(),
                            source,
                        }
                    })?;
                    documents.push(document);
                }
                let params = merge_audit_params(documents, runtime_params, &self.stage);
                let rendered = render_strict(&script, &params)?;
                (rendered, params)
            }
            TaskKind::Transform => {
                let rendered = render_transform(&script, runtime_params);
                let params = Value::Object(
                    runtime_params
                        .iter()
                        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                        .collect(),
                );
                (rendered, params)
            }
        };

        if rendered.trim().len() <= 5 {
            return Err(ContentError::EmptySqlScript {
                path: script_key.to_string(),
            }
            .into());
        }

        let rendered_sql_path = self.upload_rendered(task, &render_params, &rendered).await?;

        let purged_objects = if dest.overwrite_data {
            self.purge_destination(task, dest, &render_params).await?
        } else {
            0
        };

        let statements: Vec<&str> = rendered
            .split(';')
            .map(str::trim)
            .filter(|statement| !statement.is_empty())
            .collect();

        // Guard the whole script before any statement runs; a single
        // deny-list match keeps the entire batch from executing.
        for statement in &statements {
            check_statement(statement)?;
        }

        let mut statements_executed = 0;
        let mut last_summary = None;

        for statement in statements {
            let summary = self
                .query_service
                .start_query(statement, &task.execution_db)
                .await?;
            info!(
                execution_id = %summary.execution_id,
                status = ?summary.status,
                data_scanned_bytes = summary.statistics.data_scanned_bytes,
                engine_execution_millis = summary.statistics.engine_execution_millis,
                "Statement execution summary"
            );
            StatementExecuted {
                pipeline: task.pipeline.clone(),
            }
            .emit();

            self.validate_result(task, &summary)?;
            statements_executed += 1;
            last_summary = Some(summary);
        }

        Ok(ExecutionReport {
            rendered_sql_path,
            statements_executed,
            purged_objects,
            last_summary,
        })
    }

    /// Read an object as UTF-8, normalizing "not found" to an empty
    /// JSON document.
    async fn read_or_empty(&self, key: &str) -> Result<String, EngineError> {
        match self.assets.get_opt(key).await? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            None => {
                info!(key = %key, "No object found, treating as empty document");
                Ok("{}".to_string())
            }
        }
    }

    /// Upload the rendered SQL before execution, for traceability.
    async fn upload_rendered(
        &self,
        task: &SqlTask,
        render_params: &Value,
        rendered: &str,
    ) -> Result<String, EngineError> {
        let exec_date = match task.kind {
            TaskKind::Audit => resolve_scalar(render_params, "globals.param_exec_date")?,
            TaskKind::Transform => resolve_scalar(render_params, "param_execution_date")?,
        };

        let path = format!(
            "pipeline_executions/{}/{}/{}-{}/{}_rendered.sql",
            task.pipeline,
            exec_date,
            task.start_dttm,
            task.short_execution_id(),
            task.job_name,
        );
        self.assets.put(&path, rendered.as_bytes().to_vec()).await?;
        info!(path = %path, "Uploaded rendered SQL");
        RenderedSqlUploaded {
            pipeline: task.pipeline.clone(),
        }
        .emit();
        Ok(path)
    }

    /// Purge every object under the destination's resolved partition
    /// paths, or under the bare table path when no partition keys are
    /// declared.
    async fn purge_destination(
        &self,
        task: &SqlTask,
        dest: &DestinationTableProperties,
        render_params: &Value,
    ) -> Result<usize, EngineError> {
        let table_paths = if dest.table_partition.is_empty() {
            vec![format!("{}/", dest.table_path())]
        } else {
            partition_paths(task.kind, dest, render_params)?
                .into_iter()
                .map(|partition| format!("{}/{partition}", dest.table_path()))
                .collect()
        };

        let mut total = 0;
        for table_path in &table_paths {
            let removed = self.tables.delete_prefix(table_path).await?;
            info!(
                bucket = %dest.table_bucket,
                path = %table_path,
                removed,
                "Purged destination table path"
            );
            total += removed;
        }

        PartitionPurged {
            objects: total as u64,
            table: dest.table_name.clone(),
        }
        .emit();
        Ok(total)
    }

    /// Validate a statement's result cardinality.
    ///
    /// Transform tasks only: a DML statement that scanned zero bytes
    /// produced no data, which is an error unless the task explicitly
    /// permits it. Audit tasks skip this check.
    fn validate_result(
        &self,
        task: &SqlTask,
        summary: &QueryExecutionSummary,
    ) -> Result<(), EngineError> {
        match task.kind {
            TaskKind::Audit => Ok(()),
            TaskKind::Transform => {
                let zero_result = summary.statement_kind == StatementKind::Dml
                    && summary.statistics.data_scanned_bytes == 0;

                if zero_result {
                    if task.can_fetch_no_results {
                        warn!(
                            execution_id = %summary.execution_id,
                            "Query did not yield any result, but task is set not to fail"
                        );
                        return Ok(());
                    }
                    return Err(EngineError::NoDataProduced {
                        execution_id: summary.execution_id.clone(),
                    });
                }
                Ok(())
            }
        }
    }
}
