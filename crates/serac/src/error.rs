//! Error types for the serac execution engine.

use snafu::prelude::*;

// Re-export common errors
pub use icefall_common::error::{ConfigError, ContentError, ServiceError, StorageError};

/// Top-level errors for a SQL execution invocation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// Configuration error (partition templates, task wiring).
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Content error (rendering, empty script, injection match).
    #[snafu(display("Content error: {source}"))]
    Content { source: ContentError },

    /// Storage error reading scripts/params or purging partitions.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Query service error.
    #[snafu(display("Service error: {source}"))]
    Service { source: ServiceError },

    /// A DML statement scanned zero bytes and the task does not permit
    /// empty results.
    #[snafu(display("Query {execution_id} did not yield any result"))]
    NoDataProduced { execution_id: String },
}

impl From<ConfigError> for EngineError {
    fn from(source: ConfigError) -> Self {
        EngineError::Config { source }
    }
}

impl From<ContentError> for EngineError {
    fn from(source: ContentError) -> Self {
        EngineError::Content { source }
    }
}

impl From<StorageError> for EngineError {
    fn from(source: StorageError) -> Self {
        EngineError::Storage { source }
    }
}

impl From<ServiceError> for EngineError {
    fn from(source: ServiceError) -> Self {
        EngineError::Service { source }
    }
}
