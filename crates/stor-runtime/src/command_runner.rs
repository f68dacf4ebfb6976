use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use stor_core::{json_escape_bytes, CommandLine, ReplyBuffer, MAX_ESCAPE_INPUT_BYTES};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
};
use tracing::{debug, warn};

pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;

/// How captured output lines are written into the reply buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Each line becomes a quoted, escaped JSON array element; elements are
    /// joined by `", "`.
    EscapedArray,
    /// Lines are joined by `<br>` without escaping.
    RawJoined,
}

impl OutputMode {
    fn separator(self) -> &'static str {
        match self {
            Self::EscapedArray => ", ",
            Self::RawJoined => "<br>",
        }
    }
}

/// Result of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub succeeded: bool,
    /// Lines written into the reply buffer, lossily decoded.
    pub lines: Vec<String>,
    pub exit_code: Option<i32>,
    /// True when output was dropped because the reply buffer was full.
    pub truncated: bool,
    pub spawn_error: Option<String>,
}

impl CommandOutcome {
    fn spawn_failed(error: String) -> Self {
        Self {
            spawn_error: Some(error),
            ..Self::default()
        }
    }
}

/// Runs catalog command lines through a shell and captures stdout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: PathBuf,
    max_line_bytes: usize,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL, DEFAULT_MAX_LINE_BYTES)
    }
}

impl CommandRunner {
    /// `max_line_bytes` is clamped to `1..=MAX_ESCAPE_INPUT_BYTES` so every
    /// captured line can be escaped.
    pub fn new(shell: impl Into<PathBuf>, max_line_bytes: usize) -> Self {
        Self {
            shell: shell.into(),
            max_line_bytes: max_line_bytes.clamp(1, MAX_ESCAPE_INPUT_BYTES),
        }
    }

    pub fn shell(&self) -> &Path {
        self.shell.as_path()
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Starts `<shell> -c <command>` with stdout piped.
    pub fn spawn(&self, command: &CommandLine) -> io::Result<Child> {
        let mut process = Command::new(&self.shell);
        process
            .arg("-c")
            .arg(command.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        process.spawn()
    }

    /// Runs `command` to completion, appending its output to `output`.
    ///
    /// Success means the process started and exited with status zero; output
    /// is not required.
    pub async fn run(
        &self,
        command: &CommandLine,
        mode: OutputMode,
        output: &mut ReplyBuffer,
    ) -> CommandOutcome {
        debug!(command = %command, ?mode, "running command");
        let mut child = match self.spawn(command) {
            Ok(child) => child,
            Err(error) => {
                warn!(command = %command, %error, "failed to start command");
                return CommandOutcome::spawn_failed(error.to_string());
            }
        };
        let Some(stdout) = child.stdout.take() else {
            if let Err(error) = child.kill().await {
                warn!(command = %command, %error, "failed to kill command without stdout");
            }
            return CommandOutcome::spawn_failed("command stdout was not captured".to_string());
        };

        let mut outcome = CommandOutcome::default();
        let mut reader = OutputLineReader::new(stdout, self.max_line_bytes);
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => append_output_line(output, mode, &line, &mut outcome),
                Ok(None) => break,
                Err(error) => {
                    warn!(command = %command, %error, "failed to read command output");
                    break;
                }
            }
        }
        // Close our end of the pipe so a child still writing cannot block its exit.
        drop(reader);

        match child.wait().await {
            Ok(status) => {
                outcome.exit_code = status.code();
                outcome.succeeded = status.success();
            }
            Err(error) => {
                warn!(command = %command, %error, "failed to collect command exit status");
            }
        }
        if outcome.truncated {
            warn!(
                command = %command,
                kept_lines = outcome.lines.len(),
                max_bytes = output.max_bytes(),
                "command output truncated to fit reply"
            );
        }
        debug!(
            command = %command,
            succeeded = outcome.succeeded,
            exit_code = ?outcome.exit_code,
            "command finished"
        );
        outcome
    }
}

fn append_output_line(
    output: &mut ReplyBuffer,
    mode: OutputMode,
    line: &[u8],
    outcome: &mut CommandOutcome,
) {
    // Once a line is dropped, later lines are drained but not kept, so the
    // reply holds a contiguous prefix of the output.
    if outcome.truncated {
        return;
    }
    let separator = if outcome.lines.is_empty() {
        ""
    } else {
        mode.separator()
    };
    let text = String::from_utf8_lossy(line);
    let appended = match mode {
        OutputMode::EscapedArray => match json_escape_bytes(line) {
            Ok(escaped) => output
                .push_all_reserving(&[separator, "\"", &escaped, "\""], 0)
                .is_ok(),
            Err(_) => false,
        },
        OutputMode::RawJoined => output.push_all_reserving(&[separator, &text], 0).is_ok(),
    };
    if appended {
        outcome.lines.push(text.into_owned());
    } else {
        outcome.truncated = true;
    }
}

/// Splits a byte stream into lines without trailing `\n`, cutting lines longer
/// than `max_line_bytes` into consecutive chunks.
pub struct OutputLineReader<R> {
    reader: BufReader<R>,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin> OutputLineReader<R> {
    pub fn new(inner: R, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    pub async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(if line.is_empty() { None } else { Some(line) });
            }
            let room = self.max_line_bytes - line.len();
            let window = &available[..available.len().min(room)];
            if let Some(newline) = window.iter().position(|byte| *byte == b'\n') {
                line.extend_from_slice(&window[..newline]);
                self.reader.consume(newline + 1);
                return Ok(Some(line));
            }
            let taken = window.len();
            line.extend_from_slice(window);
            self.reader.consume(taken);
            if line.len() >= self.max_line_bytes {
                return Ok(Some(line));
            }
        }
    }
}
