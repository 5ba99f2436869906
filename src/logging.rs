//! Tracing subscriber setup.
//!
//! Logs go to stderr so that command output on stdout stays clean for
//! scripting. `RUST_LOG` overrides the configured level. With
//! `[logging] file` set, JSON lines are also written to that file through a
//! non-blocking writer, rotated daily with the last five files kept.

use anyhow::Context;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

const MAX_LOG_FILES: usize = 5;

/// Install the global subscriber. Later calls are ignored, which lets tests
/// and embedding hosts call this freely.
///
/// The returned guard flushes the log file on drop; hold it until exit.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let stderr_json = config
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let stderr_plain = (!config.json).then(|| fmt::layer().with_writer(std::io::stderr));

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling_appender(path)?);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_json)
        .with(stderr_plain)
        .with(file_layer)
        .try_init()
        .ok();
    Ok(guard)
}

/// `logs/ragline.log` rotates as `logs/ragline.<date>.log`.
fn rolling_appender(path: &Path) -> anyhow::Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ragline");
    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES);
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        builder = builder.filename_suffix(ext);
    }
    builder
        .build(dir)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}
