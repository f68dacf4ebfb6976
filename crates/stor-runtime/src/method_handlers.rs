use stor_core::{extract_argument, json_escape_str, CommandTemplate, ReplyBuffer};
use tracing::{error, info, warn};

use crate::{
    command_failure_overhead, command_failure_reply, command_success_overhead,
    command_success_reply, generic_failure_reply, invalid_argument_reply, version_reply,
    CommandRunner, OutputMode, ServiceRequest, TransportError, REPLY_STATUS_OK,
};

/// Stands in for the command text in failure replies when it cannot be escaped.
pub const UNREPORTABLE_COMMAND: &str = "(command too long to report)";

pub async fn handle_status(request: &ServiceRequest) -> Result<(), TransportError> {
    request.respond(REPLY_STATUS_OK).await
}

pub async fn handle_version(request: &ServiceRequest) -> Result<(), TransportError> {
    request.respond(&version_reply()).await
}

/// Validates, renders, and runs one shell-backed method, then replies once.
pub async fn handle_simple_command(
    request: &ServiceRequest,
    template: &CommandTemplate,
    runner: &CommandRunner,
    max_reply_bytes: usize,
) -> Result<(), TransportError> {
    let argument = match template.argument_field() {
        Some(field) => match extract_argument(request.payload(), field) {
            Ok(argument) => Some(argument),
            Err(error) => {
                info!(method = request.method(), %error, "rejected request argument");
                return request.respond(&invalid_argument_reply(field)).await;
            }
        },
        None => None,
    };

    let command = match template.render(argument.as_ref()) {
        Ok(command) => command,
        Err(render_error) => {
            error!(method = request.method(), error = %render_error, "command template misconfigured");
            return request
                .respond(&generic_failure_reply(&render_error.to_string()))
                .await;
        }
    };
    let escaped_command = match json_escape_str(command.as_str()) {
        Ok(escaped) => escaped,
        Err(escape_error) => {
            warn!(method = request.method(), error = %escape_error, "command text too long to report");
            UNREPORTABLE_COMMAND.to_string()
        }
    };

    // The element budget leaves room for whichever wrapper ends up being sent.
    let wrapper_bytes = command_success_overhead().max(command_failure_overhead(&escaped_command));
    let mut elements = ReplyBuffer::new(max_reply_bytes.saturating_sub(wrapper_bytes));
    let outcome = runner
        .run(&command, OutputMode::EscapedArray, &mut elements)
        .await;

    let reply = if outcome.succeeded {
        command_success_reply(elements.as_str())
    } else {
        info!(
            method = request.method(),
            exit_code = ?outcome.exit_code,
            spawn_error = outcome.spawn_error.as_deref().unwrap_or(""),
            "command failed"
        );
        command_failure_reply(&escaped_command, elements.as_str())
    };
    request.respond(&reply).await
}
