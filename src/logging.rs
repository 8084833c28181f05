use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "sales_etl=info";

/// Where human-readable log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    /// Keeps stdout free for machine-readable output.
    Stderr,
}

/// Start run logging: JSON lines into `log_dir/sales_etl.log.<date>` plus
/// plain lines on the console.
///
/// The returned guard flushes the file writer when dropped; hold it for the
/// life of the process.
pub fn init_logging(log_dir: &Path, console: ConsoleTarget) -> std::io::Result<WorkerGuard> {
    fs::create_dir_all(log_dir)?;

    // One file per day; writes go through a background thread
    let file_appender = tracing_appender::rolling::daily(log_dir, "sales_etl.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match console {
        ConsoleTarget::Stdout => registry
            .with(fmt::layer().with_writer(std::io::stdout))
            .init(),
        ConsoleTarget::Stderr => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    Ok(guard)
}
