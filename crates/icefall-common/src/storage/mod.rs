//! Object storage abstraction.
//!
//! Provides a unified interface over S3-style buckets and the local
//! filesystem. Every provider addresses exactly one bucket namespace;
//! paths handed to the methods here are keys within that namespace.
//!
//! "Object not found" on reads is not an error at this boundary:
//! [`StorageProvider::get_opt`] returns `None` and callers decide what an
//! absent object means.

mod url;

pub use url::BackendConfig;

use bytes::Bytes;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{IoSnafu, ObjectStoreSnafu, S3ConfigSnafu, StorageError};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    config: BackendConfig,
    object_store: Arc<dyn ObjectStore>,
    canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL.
    ///
    /// Accepts `s3://bucket[/prefix]`, `file:///path`, and bare
    /// filesystem paths (the local backend used by tests and local runs).
    pub fn for_url(url: &str) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        let object_store: Arc<dyn ObjectStore> = match &config {
            BackendConfig::S3 { bucket, .. } => {
                let store = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket.clone())
                    .build()
                    .context(S3ConfigSnafu)?;
                Arc::new(store)
            }
            BackendConfig::Local { root } => {
                let store = LocalFileSystem::new_with_prefix(root).context(ObjectStoreSnafu)?;
                Arc::new(store)
            }
        };

        Ok(Self {
            config,
            object_store,
            canonical_url: url.to_string(),
        })
    }

    /// The backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Qualify a key with the configured base prefix, if any.
    fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(
                Path::from(prefix)
                    .parts()
                    .chain(path.parts())
                    .collect(),
            ),
            None => Cow::Borrowed(path),
        }
    }

    /// List object keys under a prefix.
    ///
    /// Returns keys relative to the provider root (the given prefix is
    /// retained in each returned key), sorted for deterministic
    /// iteration. A prefix with no objects yields an empty list, not an
    /// error.
    pub async fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let full_prefix = self.qualify_path(&Path::from(prefix)).into_owned();
        let base_part_count = self
            .config
            .key()
            .map(|key| Path::from(key).parts().count())
            .unwrap_or_default();

        let mut stream = self.object_store.list(Some(&full_prefix));
        let mut keys = Vec::new();
        while let Some(result) = stream.next().await {
            match result {
                Ok(meta) => {
                    // Strip the base prefix so callers get keys relative
                    // to the provider root.
                    let relative: Path = meta.location.parts().skip(base_part_count).collect();
                    keys.push(relative.to_string());
                }
                Err(object_store::Error::NotFound { .. }) => {}
                Err(source) => return Err(StorageError::ObjectStore { source }),
            }
        }

        keys.sort();
        debug!(prefix = %prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    /// Get the contents of an object. Missing objects are an error here;
    /// use [`Self::get_opt`] when absence is an expected outcome.
    pub async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let path = Path::from(path);
        let result = self
            .object_store
            .get(&self.qualify_path(&path))
            .await
            .context(ObjectStoreSnafu)?;
        result.bytes().await.context(ObjectStoreSnafu)
    }

    /// Get the contents of an object, or `None` if it does not exist.
    pub async fn get_opt(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        match self.get(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Put bytes to a key, overwriting any existing object.
    pub async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = Path::from(path);
        self.object_store
            .put(&self.qualify_path(&path), PutPayload::from(Bytes::from(bytes)))
            .await
            .context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Put a zero-length object at a key (marker creation).
    pub async fn put_empty(&self, path: &str) -> Result<(), StorageError> {
        self.put(path, Vec::new()).await
    }

    /// Server-side copy of an object within this provider's namespace.
    pub async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let from = Path::from(from);
        let to = Path::from(to);
        self.object_store
            .copy(&self.qualify_path(&from), &self.qualify_path(&to))
            .await
            .context(ObjectStoreSnafu)?;
        debug!(from = %from, to = %to, "Copied object");
        Ok(())
    }

    /// Delete an object. Deleting a missing object is a no-op.
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let path = Path::from(path);
        match self.object_store.delete(&self.qualify_path(&path)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }

    /// Delete every object under a prefix and return the number removed.
    ///
    /// A blank prefix is refused (returns 0) rather than interpreted as
    /// "delete the whole namespace". Deleting an empty prefix is a no-op.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        if prefix.trim().is_empty() {
            return Ok(0);
        }

        let keys = self.list_with_prefix(prefix).await?;
        for (i, key) in keys.iter().enumerate() {
            debug!("Deleting object {}: {key}", i + 1);
            self.delete(key).await?;
        }

        if !keys.is_empty() {
            info!(prefix = %prefix, count = keys.len(), "Purged objects under prefix");
        }
        Ok(keys.len())
    }

    /// Check whether an object exists at the given key.
    pub async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let path = Path::from(path);
        match self.object_store.head(&self.qualify_path(&path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(StorageError::ObjectStore { source }),
        }
    }
}

/// Create a provider for a local directory, creating it first if needed.
///
/// Convenience for local runs and tests where the root may not exist yet.
pub fn local_provider(root: &std::path::Path) -> Result<StorageProvider, StorageError> {
    std::fs::create_dir_all(root).context(IoSnafu)?;
    let root = root.to_str().ok_or_else(|| StorageError::InvalidUrl {
        url: root.display().to_string(),
    })?;
    StorageProvider::for_url(root)
}
