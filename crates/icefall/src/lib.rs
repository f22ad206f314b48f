//! Icefall: ingestion dispatch and batch readiness detection.
//!
//! This crate handles the event-driven side of the pipeline:
//! - Matching arrived objects against the pipeline manifest and
//!   relocating them into partitioned landing-table paths
//! - Purging stale data in the target partition before copying
//!   (overwrite-by-replace)
//! - Triggering the downstream workflow with single-flight semantics
//!   and schedule-cadence gating
//! - Deciding when a batch of expected files has fully arrived and
//!   emitting completion markers, cascading to dependent pipelines
//!
//! Each entry point is a short-lived, single-threaded invocation driven
//! by an external event; no state is cached across invocations.

pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod metrics;
pub mod readiness;

pub use descriptor::{ExpectedFileEntry, FileDescriptor};
pub use dispatch::{CopyPlanEntry, DispatchOutcome, Dispatcher, TriggerResult};
pub use error::{DispatchError, ReadinessError};
pub use event::ObjectArrival;
pub use readiness::{DependencyRequest, ReadinessDetector, ReadinessOutcome};
