//! URL parsing for storage backends.
//!
//! The workspace addresses exactly one bucket namespace per provider, in
//! either `s3://bucket[/prefix]` form or as a local filesystem path.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, StorageError};

static S3_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$")
        .expect("Invalid S3 URL pattern")
});

static FILE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^file://(?P<path>.*)$").expect("Invalid file URL pattern"));

/// Backend configuration for a storage provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// An S3-style bucket, with an optional base key prefix.
    S3 {
        bucket: String,
        key: Option<String>,
    },
    /// A local filesystem root directory.
    Local { root: String },
}

impl BackendConfig {
    /// Parse a URL or path into a backend configuration.
    ///
    /// Accepts `s3://bucket`, `s3://bucket/prefix`, `file:///abs/path`,
    /// and bare absolute or relative filesystem paths.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        if let Some(caps) = S3_URL.captures(url) {
            let bucket = caps
                .name("bucket")
                .expect("bucket group always present")
                .as_str()
                .to_string();
            let key = caps.name("key").map(|m| m.as_str().trim_matches('/').to_string());
            return Ok(BackendConfig::S3 { bucket, key });
        }

        if let Some(caps) = FILE_URL.captures(url) {
            let path = caps.name("path").expect("path group always present").as_str();
            return Ok(BackendConfig::Local {
                root: path.to_string(),
            });
        }

        // Anything with a scheme we do not recognize is an error; bare
        // paths fall through to the local backend.
        if url.contains("://") {
            return InvalidUrlSnafu {
                url: url.to_string(),
            }
            .fail();
        }

        if url.is_empty() {
            return InvalidUrlSnafu {
                url: url.to_string(),
            }
            .fail();
        }

        Ok(BackendConfig::Local {
            root: url.to_string(),
        })
    }

    /// The base key prefix configured for this backend, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            BackendConfig::S3 { key, .. } => key.as_deref(),
            BackendConfig::Local { .. } => None,
        }
    }

    /// A display name for the addressed namespace (bucket or directory).
    pub fn namespace(&self) -> &str {
        match self {
            BackendConfig::S3 { bucket, .. } => bucket,
            BackendConfig::Local { root } => root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_url() {
        let config = BackendConfig::parse_url("s3://my-landing-bucket").unwrap();
        assert_eq!(
            config,
            BackendConfig::S3 {
                bucket: "my-landing-bucket".to_string(),
                key: None,
            }
        );
    }

    #[test]
    fn test_s3_url_with_prefix() {
        let config = BackendConfig::parse_url("s3://my-bucket/incoming/files").unwrap();
        assert_eq!(
            config,
            BackendConfig::S3 {
                bucket: "my-bucket".to_string(),
                key: Some("incoming/files".to_string()),
            }
        );
    }

    #[test]
    fn test_file_url() {
        let config = BackendConfig::parse_url("file:///tmp/landing").unwrap();
        assert_eq!(
            config,
            BackendConfig::Local {
                root: "/tmp/landing".to_string(),
            }
        );
    }

    #[test]
    fn test_bare_path() {
        let config = BackendConfig::parse_url("/tmp/landing").unwrap();
        assert_eq!(
            config,
            BackendConfig::Local {
                root: "/tmp/landing".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let result = BackendConfig::parse_url("gs://bucket/key");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(BackendConfig::parse_url("").is_err());
    }
}
