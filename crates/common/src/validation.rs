//! Input validation for identifiers and URLs arriving from callers or operators.
//!
//! Camera ids come straight from request paths and stream URLs are typed in by
//! operators, so both are bounded and checked before they reach lookups or
//! upstream requests.

use anyhow::{anyhow, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum length for resource IDs (camera_id, project_id, etc.)
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length for stream URLs and proxied resource URLs
pub const MAX_URI_LENGTH: usize = 4096;

/// Get current Unix timestamp in seconds, safely handling clock errors
pub fn safe_unix_timestamp() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "System clock is before UNIX epoch (1970-01-01), using timestamp 0"
            );
            0
        }
    }
}

/// Current Unix time in milliseconds, 0 on clock errors
pub fn safe_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate a resource ID taken from a request path
///
/// Database ids in the dashboard are cuid/uuid/numeric strings, so anything
/// outside `[A-Za-z0-9_-]` is refused.
pub fn validate_id(id: &str, field_name: &str) -> Result<()> {
    validate_non_empty(id, field_name)?;
    validate_length(id, MAX_ID_LENGTH, field_name)?;

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "{} contains invalid characters (only letters, digits, '-' and '_' allowed)",
            field_name
        ));
    }

    Ok(())
}

/// Validate a URL before it is used for an upstream request
pub fn validate_uri(uri: &str, field_name: &str) -> Result<()> {
    validate_non_empty(uri, field_name)?;
    validate_length(uri, MAX_URI_LENGTH, field_name)?;

    if uri.chars().any(|c| c.is_control()) {
        return Err(anyhow!("{} contains control characters", field_name));
    }

    Ok(())
}
