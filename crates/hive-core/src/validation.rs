//! Input validation for coordination requests.

use crate::{Error, Result};

/// Most urgent priority value.
pub const PRIORITY_MIN: i64 = 1;
/// Least urgent priority value.
pub const PRIORITY_MAX: i64 = 5;

/// Validates a task priority. Accepts 1 (highest) through 5 (lowest).
pub fn validate_priority(priority: i64) -> Result<()> {
    if (PRIORITY_MIN..=PRIORITY_MAX).contains(&priority) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "priority must be between {PRIORITY_MIN} and {PRIORITY_MAX}, got {priority}"
        )))
    }
}

/// Normalizes a resource key so equivalent spellings collide.
///
/// Trims whitespace, converts backslashes to forward slashes, collapses
/// repeated separators, and drops `.` segments. A leading slash is kept.
/// Returns `InvalidArgument` when nothing remains.
pub fn normalize_resource_key(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let unified = trimmed.replace('\\', "/");
    let absolute = unified.starts_with('/');

    let segments: Vec<&str> = unified
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect();

    if segments.is_empty() {
        return Err(Error::invalid_argument(format!(
            "resource key '{raw}' is empty after normalization"
        )));
    }

    let joined = segments.join("/");
    if absolute {
        Ok(format!("/{joined}"))
    } else {
        Ok(joined)
    }
}
