//! Workflow trigger phase.
//!
//! Each schedule declared by the pipeline produces at most one trigger
//! attempt. The RUNNING-execution count is fetched fresh per attempt and
//! a new execution starts only when it is zero. Two dispatchers racing
//! through this check can still both start an execution; that gap is
//! accepted and documented, not closed. There is no lock or idempotency
//! token at the workflow-engine boundary.

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::info;

use icefall_common::config::{PipelineConfig, Schedule, Settings};
use icefall_common::services::{retry, ParameterStore, RetryPolicy, WorkflowEngine};

use crate::error::DispatchError;
use crate::metrics::{InternalEvent, WorkflowTriggerSkipped, WorkflowTriggerStarted};

/// Outcome of one trigger attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResult {
    /// A new execution was started.
    Started {
        workflow: String,
        execution_id: String,
    },
    /// An execution of this workflow was already RUNNING.
    SkippedRunning { workflow: String },
    /// The pipeline is configured not to trigger at all.
    Disabled,
}

/// Cadence flags for one schedule on one day.
#[derive(Debug, Clone, Copy)]
struct CadenceFlags {
    monthly: bool,
    yearly: bool,
}

impl CadenceFlags {
    fn compute(schedule: &Schedule, today: NaiveDate) -> Self {
        Self {
            monthly: schedule.monthly == Some(today),
            yearly: schedule.yearly == Some(today),
        }
    }
}

fn flag(value: bool) -> Value {
    // Downstream tasks consume these as strings, not booleans.
    Value::String(if value { "true" } else { "false" }.to_string())
}

/// Assemble the workflow input payload for one schedule.
fn build_payload(
    settings: &Settings,
    pipeline: &PipelineConfig,
    schedule: &Schedule,
    exec_date: NaiveDate,
    flags: CadenceFlags,
    start_dttm: &str,
) -> serde_json::Value {
    let mut payload = serde_json::Map::new();
    payload.insert("date".to_string(), Value::String(exec_date.to_string()));
    payload.insert(
        "pipeline_type".to_string(),
        Value::String(pipeline.pipeline_type.clone()),
    );

    for (key, value) in &pipeline.workflow_payload {
        payload.insert(key.clone(), Value::String(value.clone()));
    }

    if !pipeline.runtime_sql_params.is_empty() {
        let mut sql_params = pipeline.runtime_sql_params.clone();
        sql_params.insert("param_execution_date".to_string(), exec_date.to_string());
        sql_params.insert(
            "frequency".to_string(),
            schedule.cadence.as_str().to_string(),
        );
        sql_params.insert(
            "monthly".to_string(),
            if flags.monthly { "true" } else { "false" }.to_string(),
        );
        sql_params.insert(
            "yearly".to_string(),
            if flags.yearly { "true" } else { "false" }.to_string(),
        );
        payload.insert(
            "runtime_sql_params".to_string(),
            Value::String(serde_json::to_string(&sql_params).expect("string map serializes")),
        );
    }

    payload.insert("monthly".to_string(), flag(flags.monthly));
    payload.insert("yearly".to_string(), flag(flags.yearly));
    payload.insert(
        "frequency".to_string(),
        Value::String(schedule.cadence.as_str().to_string()),
    );
    payload.insert(
        "start_dttm".to_string(),
        Value::String(start_dttm.to_string()),
    );
    payload.insert("env".to_string(), Value::String(settings.stage.clone()));

    Value::Object(payload)
}

/// Run the trigger phase for every schedule the pipeline declares.
pub(crate) async fn run_trigger_phase(
    engine: &dyn WorkflowEngine,
    parameters: &dyn ParameterStore,
    settings: &Settings,
    pipeline: &PipelineConfig,
    exec_date: NaiveDate,
    today: NaiveDate,
    retry_policy: RetryPolicy,
) -> Result<Vec<TriggerResult>, DispatchError> {
    if !pipeline.trigger_workflow {
        info!(
            pipeline = %pipeline.pipeline_type,
            "Workflow not set to trigger for this pipeline"
        );
        return Ok(vec![TriggerResult::Disabled]);
    }

    let start_dttm = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let mut results = Vec::with_capacity(pipeline.schedules.len());

    for schedule in &pipeline.schedules {
        let flags = CadenceFlags::compute(schedule, today);
        let payload = build_payload(settings, pipeline, schedule, exec_date, flags, &start_dttm);

        let workflow = parameters.get_parameter(&schedule.workflow_parameter).await?;
        info!(
            pipeline = %pipeline.pipeline_type,
            workflow = %workflow,
            cadence = schedule.cadence.as_str(),
            "Starting pipeline workflow"
        );

        let running = retry(retry_policy, "running_executions", || {
            engine.running_executions(&workflow)
        })
        .await?;

        if running > 0 {
            info!(
                workflow = %workflow,
                running,
                "SKIP: workflow already has a RUNNING execution, not starting a new one"
            );
            WorkflowTriggerSkipped {
                workflow: workflow.clone(),
            }
            .emit();
            results.push(TriggerResult::SkippedRunning { workflow });
            continue;
        }

        let started = retry(retry_policy, "start_execution", || {
            engine.start_execution(&workflow, &payload)
        })
        .await?;
        info!(
            workflow = %workflow,
            execution_id = %started.execution_id,
            "Started workflow execution"
        );
        WorkflowTriggerStarted {
            workflow: workflow.clone(),
        }
        .emit();
        results.push(TriggerResult::Started {
            workflow,
            execution_id: started.execution_id,
        });
    }

    Ok(results)
}
