use docsyncd::daemon::{DaemonConfig, DaemonRuntime, list_documents};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    List,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--list" => mode = CliMode::List,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docsyncd=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: docsync [--list]");
            println!("  --list   Print all documents as JSON and exit");
            println!();
            println!("Environment: DOCSYNC_BASE_URL, DOCSYNC_POLL_SECS, DOCSYNC_DOWNLOAD_DIR, DOCSYNC_ASSUME_YES");
            return Ok(());
        }
        CliMode::List => {
            let config = DaemonConfig::from_env();
            println!("{}", list_documents(&config).await?);
            return Ok(());
        }
        CliMode::Run => {}
    }
    let config = DaemonConfig::from_env();
    let runtime = DaemonRuntime::bootstrap(config)?;
    runtime.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_mode_defaults_to_run() {
        let mode = parse_cli_mode(vec!["docsync".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Run);
    }

    #[test]
    fn parse_cli_mode_supports_list() {
        let mode = parse_cli_mode(vec!["docsync".to_string(), "--list".to_string()]).unwrap();
        assert_eq!(mode, CliMode::List);
    }

    #[test]
    fn parse_cli_mode_supports_help() {
        let mode = parse_cli_mode(vec!["docsync".to_string(), "-h".to_string()]).unwrap();
        assert_eq!(mode, CliMode::Help);
    }

    #[test]
    fn parse_cli_mode_rejects_unknown_flags() {
        let err = parse_cli_mode(vec!["docsync".to_string(), "--watch".to_string()]).unwrap_err();
        assert!(err.to_string().contains("--watch"));
    }
}
