//! Partition path construction.
//!
//! Maps a destination table's partition-key template plus render
//! parameters into ordered `key=value/` path suffixes, per task kind.
//! Transform tasks allow at most two levels and may fan out over a
//! multi-valued `data_grain` key; audit tasks require exactly four
//! fixed keys. The level caps are properties of the task kind, enforced
//! here before any purge runs.

use serde_json::Value;

use icefall_common::error::ConfigError;

use crate::error::EngineError;
use crate::render::resolve_scalar;
use crate::task::{DestinationTableProperties, TaskKind};

/// The grain values a `data_grain` partition key fans out over.
///
/// Daily output is always written; the monthly grain is added when the
/// run carries the monthly cadence flag.
fn data_grain_values(params: &Value) -> Vec<&'static str> {
    let monthly = params
        .get("monthly")
        .and_then(Value::as_str)
        .map(|flag| flag.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if monthly {
        vec!["daily", "monthly"]
    } else {
        vec!["daily"]
    }
}

/// Resolve the partition paths for a destination table.
///
/// Returns one path per target partition. A template with a
/// multi-valued key yields several paths, each inheriting the fixed
/// `key=value/` segments that precede it.
pub fn partition_paths(
    kind: TaskKind,
    dest: &DestinationTableProperties,
    params: &Value,
) -> Result<Vec<String>, EngineError> {
    let levels = dest.table_partition.len();

    match kind {
        TaskKind::Transform => {
            if levels > 2 {
                return Err(ConfigError::TransformPartitionLevels {
                    table: dest.table_name.clone(),
                    levels,
                }
                .into());
            }

            let mut fixed_prefix = String::new();
            let mut fanout: Option<(String, Vec<&'static str>)> = None;

            for key in dest.table_partition.keys() {
                match key.as_str() {
                    "exec_date" => {
                        let value = resolve_scalar(params, "param_execution_date")?;
                        fixed_prefix.push_str(&format!("{key}={value}/"));
                    }
                    "data_grain" => {
                        fanout = Some((key.clone(), data_grain_values(params)));
                    }
                    other => {
                        return Err(ConfigError::UnknownPartitionKey {
                            key: other.to_string(),
                            table: dest.table_name.clone(),
                        }
                        .into());
                    }
                }
            }

            match fanout {
                Some((key, values)) => Ok(values
                    .into_iter()
                    .map(|value| format!("{fixed_prefix}{key}={value}/"))
                    .collect()),
                None if fixed_prefix.is_empty() => Ok(Vec::new()),
                None => Ok(vec![fixed_prefix]),
            }
        }
        TaskKind::Audit => {
            if levels != 4 {
                return Err(ConfigError::AuditPartitionLevels {
                    table: dest.table_name.clone(),
                    levels,
                }
                .into());
            }

            let mut path = String::new();
            for key in dest.table_partition.keys() {
                let source = match key.as_str() {
                    "pipeline" => "globals.param_pipeline_name",
                    "exec_date" => "globals.param_exec_date",
                    "table_name" => "globals.param_audited_table_name",
                    "time_grain" => "globals.param_grain",
                    other => {
                        return Err(ConfigError::UnknownPartitionKey {
                            key: other.to_string(),
                            table: dest.table_name.clone(),
                        }
                        .into());
                    }
                };
                let value = resolve_scalar(params, source)?;
                path.push_str(&format!("{key}={value}/"));
            }

            Ok(vec![path])
        }
    }
}
