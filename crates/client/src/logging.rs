//! Logging setup for the simulation binary.

use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE: &str = "raid-sim.log";

/// Setup logging to both stderr and a per-session file.
///
/// The returned guard flushes the file writer when dropped, so hold it until
/// the process exits.
pub fn setup_logging(log_dir: Option<PathBuf>, session_id: &str) -> Result<WorkerGuard> {
    let session_log_dir = log_dir.unwrap_or_else(default_log_dir).join(session_id);
    std::fs::create_dir_all(&session_log_dir)?;

    let file_appender = tracing_appender::rolling::never(&session_log_dir, LOG_FILE);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins; otherwise info and above.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging initialized: session={}", session_id);
    tracing::info!("Log file: {}", session_log_dir.join(LOG_FILE).display());

    Ok(guard)
}

/// Platform cache directory for logs
///
/// - macOS: `~/Library/Caches/global-raid/logs`
/// - Linux: `~/.cache/global-raid/logs` (or `$XDG_CACHE_HOME/global-raid/logs`)
/// - Windows: `%LOCALAPPDATA%\global-raid\cache\logs`
/// - Fallback: `/tmp/global-raid/logs`
fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "global-raid")
        .map(|dirs| dirs.cache_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("/tmp/global-raid/logs"))
}
