//! Logging setup: stderr + a daily append-only log file under
//! `<download_dir>/logs/`. See `SPEC_FULL.md` section A.1.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes the global tracing subscriber. The returned [`WorkerGuard`]
/// must be held for the lifetime of the process; dropping it early stops
/// flushing the file writer.
pub fn init(download_dir: &Path, verbose: u8, quiet: bool) -> anyhow::Result<WorkerGuard> {
    let log_dir = download_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "scraper");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = default_level_str(verbose, quiet);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(guard)
}

fn default_level_str(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
