//! SQL injection guard.
//!
//! A fixed case-insensitive deny-list scanned before any statement
//! executes. A match anywhere in the script keeps the whole batch from
//! running, not just the matching statement.

use regex::RegexSet;
use std::sync::LazyLock;

use icefall_common::error::ContentError;

static DANGEROUS_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)DROP\s+TABLE",
        r"(?i)DELETE\s+FROM",
        r"(?i)EXEC\s*\(",
        r"(?i)EXECUTE\s*\(",
        r"(?i)xp_cmdshell",
        r"(?i)\bsys\.",
        r"(?i)information_schema\.",
    ])
    .expect("Invalid injection pattern")
});

/// Check a statement against the deny-list.
pub fn check_statement(statement: &str) -> Result<(), ContentError> {
    if DANGEROUS_PATTERNS.is_match(statement) {
        return Err(ContentError::SqlInjection {
            statement: statement.to_string(),
        });
    }
    Ok(())
}
