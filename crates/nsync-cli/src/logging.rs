//! Tracing subscriber setup.
//!
//! Filter priority, highest first: `NSYNC_LOG`, `RUST_LOG`, the `--log`
//! flag, the configured `log_level`. The daemon logs to `<config_dir>/log`
//! unless `--verbose` is given; client commands only log when verbose.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

const FALLBACK_LEVEL: &str = "info";

/// Pick the filter directives from the environment and the CLI level.
fn directives(nsync_log: Option<String>, rust_log: Option<String>, level: &str) -> String {
    [nsync_log, rust_log]
        .into_iter()
        .flatten()
        .find(|d| !d.trim().is_empty() && EnvFilter::try_new(d).is_ok())
        .unwrap_or_else(|| level.to_string())
}

fn build_env_filter(level: &str) -> EnvFilter {
    let directives = directives(
        std::env::var("NSYNC_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
        level,
    );
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Subscriber for the daemon.
pub fn init_daemon(level: &str, verbose: bool, log_path: &Path) -> anyhow::Result<()> {
    if verbose {
        init_console(level);
        return Ok(());
    }

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(())
}

/// Subscriber writing to stderr.
pub fn init_console(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
