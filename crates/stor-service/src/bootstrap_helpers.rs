use stor_cli::Cli;
use stor_runtime::ServiceConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries reply frames.
pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn service_config_from_cli(cli: &Cli) -> ServiceConfig {
    ServiceConfig {
        shell: cli.shell.clone(),
        max_reply_bytes: cli.max_reply_bytes,
        max_line_bytes: cli.max_line_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::service_config_from_cli;
    use clap::Parser;
    use stor_cli::Cli;
    use stor_runtime::ServiceConfig;

    #[test]
    fn unit_default_flags_match_default_service_config() {
        let cli = Cli::try_parse_from(["stor-service"]).expect("parse");
        assert_eq!(service_config_from_cli(&cli), ServiceConfig::default());
    }

    #[test]
    fn functional_flags_flow_into_service_config() {
        let cli = Cli::try_parse_from([
            "stor-service",
            "--shell",
            "/bin/dash",
            "--max-reply-bytes",
            "2048",
            "--max-line-bytes",
            "128",
        ])
        .expect("parse");
        let config = service_config_from_cli(&cli);
        assert_eq!(config.shell, std::path::PathBuf::from("/bin/dash"));
        assert_eq!(config.max_reply_bytes, 2048);
        assert_eq!(config.max_line_bytes, 128);
    }
}
