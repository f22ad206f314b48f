//! Object-arrival notifications.
//!
//! An arrival names a single object that just landed in the staging
//! area. The dispatcher derives everything else (pipeline, execution
//! date, siblings) fresh from the key.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use icefall_common::error::ContentError;

/// Execution dates appear as a full `/YYYY-MM-DD/` path segment.
static EXEC_DATE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4}-\d{2}-\d{2})/").expect("Invalid date pattern"));

/// A file-arrival notification for a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectArrival {
    /// Bucket the object landed in.
    pub bucket: String,
    /// Full object key.
    pub key: String,
}

impl ObjectArrival {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// The key without its final path segment.
    pub fn key_path(&self) -> &str {
        self.key.rsplit_once('/').map(|(path, _)| path).unwrap_or("")
    }

    /// The final path segment (the arrived file's name).
    pub fn key_name(&self) -> &str {
        self.key.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.key)
    }

    /// Whether the base name carries an extension.
    ///
    /// Folder-creation events arrive as keys without one; the dispatcher
    /// ignores those.
    pub fn has_extension(&self) -> bool {
        self.key_name().contains('.')
    }

    /// Extract and validate the `/YYYY-MM-DD/` execution date from the key.
    pub fn exec_date(&self) -> Result<NaiveDate, ContentError> {
        let captures =
            EXEC_DATE_SEGMENT
                .captures(&self.key)
                .ok_or_else(|| ContentError::MissingExecutionDate {
                    key: self.key.clone(),
                })?;
        let raw = captures.get(1).expect("date group always present").as_str();

        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            ContentError::MalformedExecutionDate {
                date: raw.to_string(),
                key: self.key.clone(),
            }
        })
    }
}
