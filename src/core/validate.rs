//! Identifier validation for project, env, and file names.

use crate::error::{Result, ValidationError};

/// Validate a project/env/file-name identifier.
///
/// Allowed characters are ASCII letters, digits, `-`, `_`, and `.`;
/// anything resembling a path traversal is rejected outright.
pub fn validate_identifier(name: &str, field: &'static str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyField { field }.into());
    }
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            continue;
        }
        return Err(ValidationError::InvalidCharacter { field, ch }.into());
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ValidationError::PathSeparator.into());
    }
    Ok(())
}
