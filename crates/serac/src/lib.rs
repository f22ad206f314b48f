//! Serac: templated SQL rendering and partition-safe query execution.
//!
//! This crate is the SQL side of the pipeline. Given a stored script,
//! parameter files, and destination-table properties it:
//!
//! - Renders the final SQL in one of two modes (strict template
//!   expansion for audit tasks, literal token substitution for
//!   transform tasks)
//! - Computes multi-level partition paths per task kind
//! - Purges the target partition(s) before writing when overwrite is
//!   requested (overwrite-by-replace)
//! - Guards every statement against a deny-list of dangerous SQL
//! - Executes statements sequentially and validates that
//!   result-producing statements actually produced data
//!
//! The purge-then-execute sequence is not transactional: a crash
//! between the purge and a successful write leaves the partition empty.
//! Safety comes from idempotence (re-running the same task converges to
//! the same final state), not from rollback.

pub mod engine;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod partition;
pub mod render;
pub mod task;

pub use engine::{ExecutionReport, QueryEngine};
pub use error::EngineError;
pub use guard::check_statement;
pub use partition::partition_paths;
pub use task::{DestinationTableProperties, SqlTask, TaskKind};
