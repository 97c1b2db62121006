use crate::app_dirs::AppDirs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "spellathon.log";

/// Keeps the background writer alive; logs are flushed when dropped.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// `LOG_DIR` wins over the per-user state directory.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var_os("LOG_DIR")
        .map(PathBuf::from)
        .or_else(AppDirs::log_dir)
}

/// Installs a daily rolling file subscriber. The terminal belongs to the UI,
/// so nothing is written to stdout; without a usable log directory logging
/// stays off.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = log_dir()?;
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log directory {}: {err}", log_dir.display());
        return None;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }

    Some(FileLogGuard { _guard: guard })
}
