//! Common error types shared between icefall and serac.
//!
//! The taxonomy separates configuration mistakes (never retried), content
//! problems in a single unit of work, storage failures, and external
//! service failures. "Object not found" on reads is not an error anywhere
//! in this workspace; adapters normalize it to an absent value.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during object storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error: {source}"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors raised by manifest loading, lookup, and partition templates.
///
/// These are always fatal and never retried.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// No pipeline is registered under the given control-file name.
    #[snafu(display("Unknown control file: {control_file}"))]
    UnknownControlFile { control_file: String },

    /// No pipeline is registered with the given type identifier.
    #[snafu(display("Unknown pipeline type: {pipeline_type}"))]
    UnknownPipelineType { pipeline_type: String },

    /// The per-pipeline expected-file descriptor does not exist.
    #[snafu(display("Missing file descriptor for pipeline {pipeline_type} at {path}"))]
    MissingDescriptor {
        pipeline_type: String,
        path: String,
    },

    /// The per-pipeline expected-file descriptor is not valid JSON.
    #[snafu(display("Failed to parse file descriptor for pipeline {pipeline_type}: {source}"))]
    DescriptorParse {
        pipeline_type: String,
        source: serde_json::Error,
    },

    /// The per-pipeline expected-file descriptor could not be read.
    #[snafu(display("Failed to read file descriptor for pipeline {pipeline_type}: {source}"))]
    DescriptorRead {
        pipeline_type: String,
        source: StorageError,
    },

    /// A pipeline has an empty incoming path.
    #[snafu(display("Pipeline '{pipeline}' has empty incoming_path"))]
    EmptyIncomingPath { pipeline: String },

    /// A pipeline declares no workflow schedules.
    #[snafu(display("Pipeline '{pipeline}' has no schedules"))]
    NoSchedules { pipeline: String },

    /// Two control files map to the same pipeline type.
    #[snafu(display("Pipeline type '{pipeline_type}' registered more than once"))]
    DuplicatePipelineType { pipeline_type: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML manifest.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read the manifest file.
    #[snafu(display("Failed to read manifest file: {source}"))]
    ReadFile { source: std::io::Error },

    /// A transform partition template exceeds the two-level cap.
    #[snafu(display(
        "Table '{table}' declares {levels} partition levels; transform tasks allow at most 2"
    ))]
    TransformPartitionLevels { table: String, levels: usize },

    /// An audit partition template does not have exactly four levels.
    #[snafu(display(
        "Table '{table}' declares {levels} partition levels; audit tasks require exactly 4"
    ))]
    AuditPartitionLevels { table: String, levels: usize },

    /// A partition template names a key the path builder cannot resolve.
    #[snafu(display("Unknown partition key '{key}' for table '{table}'"))]
    UnknownPartitionKey { key: String, table: String },
}

// ============ Content Errors ============

/// Errors caused by the content of a single unit of work.
///
/// Fatal for the current invocation only; re-driving with corrected
/// inputs is always safe.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ContentError {
    /// The rendered SQL script is empty.
    #[snafu(display("Empty SQL script: {path}"))]
    EmptySqlScript { path: String },

    /// The object key carries no `/YYYY-MM-DD/` execution date segment.
    #[snafu(display("No execution date found in object key: {key}"))]
    MissingExecutionDate { key: String },

    /// The execution date segment is not a real calendar date.
    #[snafu(display("Malformed execution date '{date}' in object key: {key}"))]
    MalformedExecutionDate { date: String, key: String },

    /// A statement matched the SQL injection deny-list.
    #[snafu(display("Potential SQL injection detected in statement: {statement}"))]
    SqlInjection { statement: String },

    /// Strict template expansion referenced an absent variable.
    #[snafu(display("Undefined template variable: {variable}"))]
    UndefinedTemplateVariable { variable: String },

    /// Strict template expansion resolved a variable to a non-scalar value.
    #[snafu(display("Template variable '{variable}' is not a scalar value"))]
    NonScalarTemplateVariable { variable: String },

    /// A SQL parameter file is not valid JSON.
    #[snafu(display("Failed to parse SQL parameter file {path}: {source}"))]
    ParamFileParse {
        path: String,
        source: serde_json::Error,
    },
}

// ============ Service Errors ============

/// Errors returned by the external service boundaries (query service,
/// workflow engine, parameter store).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    /// The query service rejected or failed the query.
    #[snafu(display("Query service error: {message}"))]
    Query { message: String },

    /// The workflow engine call failed.
    #[snafu(display("Workflow engine error: {message}"))]
    Workflow { message: String },

    /// The parameter store call failed.
    #[snafu(display("Parameter store error: {message}"))]
    Parameter { message: String },

    /// The named parameter does not exist.
    #[snafu(display("Parameter not found: {name}"))]
    ParameterNotFound { name: String },

    /// A retried operation failed on every attempt.
    #[snafu(display("'{operation}' failed after {attempts} attempts: {message}"))]
    RetriesExhausted {
        operation: String,
        attempts: usize,
        message: String,
    },
}
