use std::path::PathBuf;

use clap::Parser;
use stor_core::MAX_ESCAPE_INPUT_BYTES;

use crate::CliTransportMode;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_line_limit(value: &str) -> Result<usize, String> {
    let parsed = parse_positive_usize(value)?;
    if parsed > MAX_ESCAPE_INPUT_BYTES {
        return Err(format!(
            "value must be in range 1..={MAX_ESCAPE_INPUT_BYTES}"
        ));
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "stor-service",
    about = "Storage-management bus service: volume listing, mounts, media resize",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "STOR_SHELL",
        default_value = "/bin/sh",
        help = "Shell used to run catalog command lines via `-c`"
    )]
    pub shell: PathBuf,

    #[arg(
        long = "max-reply-bytes",
        env = "STOR_MAX_REPLY_BYTES",
        default_value_t = 65_536,
        value_parser = parse_positive_usize,
        help = "Upper bound on the size of one JSON reply; excess command output is dropped line by line"
    )]
    pub max_reply_bytes: usize,

    #[arg(
        long = "max-line-bytes",
        env = "STOR_MAX_LINE_BYTES",
        default_value_t = 1_024,
        value_parser = parse_line_limit,
        help = "Longest captured output line; longer lines are split into chunks"
    )]
    pub max_line_bytes: usize,

    #[arg(
        long,
        env = "STOR_TRANSPORT",
        value_enum,
        default_value_t = CliTransportMode::Stdio,
        help = "Bus transport used to receive requests and send replies"
    )]
    pub transport: CliTransportMode,
}
