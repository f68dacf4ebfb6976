use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTransportMode {
    /// NDJSON request frames on stdin, reply frames on stdout.
    Stdio,
}
