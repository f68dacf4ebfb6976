use serde_json::Value;

use crate::StorageError;

/// Characters permitted in any argument interpolated into a shell command.
pub const ALLOWED_ARGUMENT_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.-";

/// Longest accepted argument; matches the longest device or volume name.
pub const MAX_ARGUMENT_BYTES: usize = 255;

/// A request argument that passed the allow-list check.
///
/// Only [`validate_argument`] and [`extract_argument`] construct this type, so
/// holding one proves the value is safe to place on a shell command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedArgument {
    field: String,
    value: String,
}

impl ValidatedArgument {
    /// Returns the validated value.
    pub fn as_str(&self) -> &str {
        self.value.as_str()
    }

    /// Returns the request field the value was read from.
    pub fn field(&self) -> &str {
        self.field.as_str()
    }
}

/// Returns true when `candidate` is non-empty and uses only allow-listed bytes.
pub fn is_allowed_argument(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-')
}

/// Validates one caller-supplied value for `field`.
///
/// Values longer than [`MAX_ARGUMENT_BYTES`] are rejected like disallowed ones.
pub fn validate_argument(field: &str, candidate: &str) -> Result<ValidatedArgument, StorageError> {
    if candidate.len() > MAX_ARGUMENT_BYTES || !is_allowed_argument(candidate) {
        return Err(StorageError::invalid_argument(field));
    }
    Ok(ValidatedArgument {
        field: field.to_string(),
        value: candidate.to_string(),
    })
}

/// Reads `field` from a JSON request payload and validates it.
///
/// Unparseable payloads, absent fields, and non-string values are reported the
/// same way as disallowed characters.
pub fn extract_argument(payload: &str, field: &str) -> Result<ValidatedArgument, StorageError> {
    let parsed = serde_json::from_str::<Value>(payload)
        .map_err(|_| StorageError::invalid_argument(field))?;
    let candidate = parsed
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| StorageError::invalid_argument(field))?;
    validate_argument(field, candidate)
}
