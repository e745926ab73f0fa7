//! `strand` binary: replays JSON-lines events from stdin through the
//! configured pipeline and prints what reaches the `print` sink to stdout.

use std::io;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("STRAND_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn main() -> ExitCode {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("strand.toml"));

    let config = match strand_cli::load_config(selected_config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("strand: {e}");
            return ExitCode::from(2);
        }
    };

    // Logs go to stderr; stdout carries pipeline output.
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    match strand_cli::run(&config, stdin.lock(), &mut stdout.lock()) {
        Ok(summary) => {
            tracing::info!(
                lines = summary.lines,
                dispatched = summary.dispatched,
                skipped = summary.skipped,
                "replay finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "replay failed");
            ExitCode::FAILURE
        }
    }
}
