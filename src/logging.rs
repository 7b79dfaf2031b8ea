use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "adaptive-core.log";

/// Keeps the background log writer alive; drop it last.
pub struct FileLogGuard {
    _guard: WorkerGuard,
    pub directory: PathBuf,
}

pub fn file_logging_enabled() -> bool {
    std::env::var("ENABLE_FILE_LOGS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

pub fn log_dir() -> PathBuf {
    std::env::var("LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./logs"))
}

/// Installs the global subscriber. A second call is a no-op, which keeps
/// test binaries that initialise logging more than once happy.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    if file_logging_enabled() {
        return init_tracing_with_file(log_level, log_dir());
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt::layer().with_target(true))
        .try_init();

    None
}

pub fn init_tracing_with_file(log_level: &str, directory: PathBuf) -> Option<FileLogGuard> {
    if let Err(err) = std::fs::create_dir_all(&directory) {
        eprintln!("failed to create log directory {}: {err}", directory.display());
        let _ = tracing_subscriber::registry()
            .with(env_filter(log_level))
            .with(fmt::layer().with_target(true))
            .try_init();
        return None;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init();

    Some(FileLogGuard {
        _guard: guard,
        directory,
    })
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}
