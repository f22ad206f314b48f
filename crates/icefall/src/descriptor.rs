//! Per-pipeline expected-file descriptors.
//!
//! A descriptor is a JSON document in the object store at
//! `<descriptor_prefix>/<pipeline-type>.json`, read once per
//! invocation. It lists every file a pipeline's batch is expected to
//! contain and which landing table each one feeds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use icefall_common::error::ConfigError;
use icefall_common::StorageProvider;

/// One row of a pipeline's file manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedFileEntry {
    /// Matching prefix/substring for the incoming file name.
    pub prefix: String,
    /// Destination landing table.
    pub table: String,
    /// Whether the destination path is partitioned by execution date.
    #[serde(default)]
    pub partitioned: bool,
}

/// The full expected-file manifest for one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub expected_files: Vec<ExpectedFileEntry>,
}

impl FileDescriptor {
    /// Fetch and parse the descriptor for a pipeline type.
    ///
    /// A missing descriptor is a configuration error, not an empty
    /// manifest: a registered pipeline without a descriptor cannot be
    /// dispatched safely.
    pub async fn load(
        storage: &StorageProvider,
        descriptor_prefix: &str,
        pipeline_type: &str,
    ) -> Result<Self, ConfigError> {
        let path = format!("{descriptor_prefix}/{pipeline_type}.json");
        debug!(path = %path, "Loading file descriptor");

        let bytes = storage
            .get_opt(&path)
            .await
            .map_err(|source| ConfigError::DescriptorRead {
                pipeline_type: pipeline_type.to_string(),
                source,
            })?;

        let bytes = bytes.ok_or_else(|| ConfigError::MissingDescriptor {
            pipeline_type: pipeline_type.to_string(),
            path: path.clone(),
        })?;

        serde_json::from_slice(&bytes).map_err(|source| ConfigError::DescriptorParse {
            pipeline_type: pipeline_type.to_string(),
            source,
        })
    }

    /// The expected prefixes, in declaration order.
    pub fn prefixes(&self) -> Vec<&str> {
        self.expected_files
            .iter()
            .map(|entry| entry.prefix.as_str())
            .collect()
    }
}
