//! Fixed-shape JSON reply bodies sent back over the bus.
//!
//! Replies are assembled as text so the escaping of command output follows
//! [`stor_core::json_escape_bytes`] exactly.

use stor_core::{
    escaped_prefix_len, json_escape_bytes, json_escape_str, ReplyBuffer, StorageError,
};

pub const API_VERSION: &str = "1";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const REPLY_STATUS_OK: &str = "{\"returnValue\": true}";
pub const REPLY_RESIZE_START: &str = "{\"returnValue\": true, \"stage\": \"start\"}";
pub const REPLY_RESIZE_COMPLETED: &str = "{\"returnValue\": true, \"stage\": \"completed\"}";
pub const REPLY_RESIZE_FAILED: &str = "{\"returnValue\": false, \"stage\": \"failed\"}";

const COMMAND_SUCCESS_PREFIX: &str = "{\"stdOut\": [";
const COMMAND_SUCCESS_SUFFIX: &str = "], \"returnValue\": true}";
const COMMAND_FAILURE_PREFIX: &str = "{\"errorText\": \"Unable to run command: ";
const COMMAND_FAILURE_STDERR: &str = "\", \"stdErr\": [";
const COMMAND_FAILURE_SUFFIX: &str = "], \"returnValue\": false, \"errorCode\": -1}";
const RESIZE_STATUS_PREFIX: &str = "{\"returnValue\": true, \"stage\": \"status\", \"status\": \"";
const RESIZE_STATUS_SUFFIX: &str = "\"}";

/// `{"returnValue": true, "version": ..., "apiVersion": ...}`.
pub fn version_reply() -> String {
    format!(
        "{{\"returnValue\": true, \"version\": \"{SERVICE_VERSION}\", \"apiVersion\": \"{API_VERSION}\"}}"
    )
}

/// Generic failure with a caller-visible message.
pub fn generic_failure_reply(error_text: &str) -> String {
    let escaped = json_escape_str(error_text).unwrap_or_else(|_| "request failed".to_string());
    format!("{{\"returnValue\": false, \"errorCode\": -1, \"errorText\": \"{escaped}\"}}")
}

/// Validation failure for the named request field.
pub fn invalid_argument_reply(field: &str) -> String {
    generic_failure_reply(&format!("Invalid or missing {field}"))
}

pub fn unknown_method_reply(method: &str) -> String {
    generic_failure_reply(&format!("Unknown method: {method}"))
}

/// Bytes a success reply adds around the captured output elements.
pub fn command_success_overhead() -> usize {
    COMMAND_SUCCESS_PREFIX.len() + COMMAND_SUCCESS_SUFFIX.len()
}

/// Bytes a failure reply adds around the captured output elements.
pub fn command_failure_overhead(escaped_command: &str) -> usize {
    COMMAND_FAILURE_PREFIX.len()
        + escaped_command.len()
        + COMMAND_FAILURE_STDERR.len()
        + COMMAND_FAILURE_SUFFIX.len()
}

/// `{"stdOut": [<elements>], "returnValue": true}`.
pub fn command_success_reply(elements: &str) -> String {
    [COMMAND_SUCCESS_PREFIX, elements, COMMAND_SUCCESS_SUFFIX].concat()
}

/// Failure report carrying the escaped command and captured output.
pub fn command_failure_reply(escaped_command: &str, elements: &str) -> String {
    [
        COMMAND_FAILURE_PREFIX,
        escaped_command,
        COMMAND_FAILURE_STDERR,
        elements,
        COMMAND_FAILURE_SUFFIX,
    ]
    .concat()
}

/// One streamed resize progress reply, built in its own bounded buffer.
///
/// A line too long for `max_reply_bytes` is cut so the reply still fits; the
/// flag reports whether that happened. Errors only when not even an empty
/// status fits.
pub fn resize_status_reply(
    line: &[u8],
    max_reply_bytes: usize,
) -> Result<(String, bool), StorageError> {
    let wrapper_bytes = RESIZE_STATUS_PREFIX.len() + RESIZE_STATUS_SUFFIX.len();
    let room = max_reply_bytes.saturating_sub(wrapper_bytes);
    let kept = escaped_prefix_len(line, room);
    let escaped = json_escape_bytes(&line[..kept])?;
    let mut reply = ReplyBuffer::new(max_reply_bytes);
    reply.push_all_reserving(&[RESIZE_STATUS_PREFIX, &escaped, RESIZE_STATUS_SUFFIX], 0)?;
    Ok((reply.into_string(), kept < line.len()))
}
