//! Error types for the icefall dispatcher and readiness detector.

use snafu::prelude::*;

// Re-export common errors
pub use icefall_common::error::{ConfigError, ContentError, ServiceError, StorageError};

/// Top-level errors for an ingestion dispatch invocation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DispatchError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Content error in the arrival event or its siblings.
    #[snafu(display("Content error: {source}"))]
    Content { source: ContentError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Workflow engine or parameter store error.
    #[snafu(display("Service error: {source}"))]
    Service { source: ServiceError },

    /// An expected-file prefix matched no object in the incoming set.
    #[snafu(display("No incoming object matches expected prefix '{prefix}'"))]
    ExpectedFileMissing { prefix: String },
}

impl From<ConfigError> for DispatchError {
    fn from(source: ConfigError) -> Self {
        DispatchError::Config { source }
    }
}

impl From<ContentError> for DispatchError {
    fn from(source: ContentError) -> Self {
        DispatchError::Content { source }
    }
}

impl From<StorageError> for DispatchError {
    fn from(source: StorageError) -> Self {
        DispatchError::Storage { source }
    }
}

impl From<ServiceError> for DispatchError {
    fn from(source: ServiceError) -> Self {
        DispatchError::Service { source }
    }
}

/// Top-level errors for a readiness-detection invocation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[snafu(context(suffix(ReadinessCtx)))]
pub enum ReadinessError {
    /// Configuration error (unknown pipeline type, missing descriptor).
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },
}

impl From<ConfigError> for ReadinessError {
    fn from(source: ConfigError) -> Self {
        ReadinessError::Config { source }
    }
}

impl From<StorageError> for ReadinessError {
    fn from(source: StorageError) -> Self {
        ReadinessError::Storage { source }
    }
}
