use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::ConfigError;
use crate::settings::{FileLoggerConfig, LoggerConfig, RotationPeriod};

/// Keeps the background file writer alive. Dropping it flushes pending lines.
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops the file writer"]
pub struct LoggerGuard {
    file_guard: Option<WorkerGuard>,
}

impl LoggerGuard {
    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Flushes buffered file output and stops the writer thread.
    pub fn flush(self) {
        drop(self.file_guard);
    }
}

/// Installs the global tracing subscriber described by `config`.
///
/// The console sink writes human-readable lines to stdout, the file sink
/// writes JSON lines through a non-blocking (optionally rolling) appender.
/// Each sink has its own level. Disabled sinks are not installed at all; with
/// both disabled no global subscriber is set.
pub fn init_logger(config: &LoggerConfig) -> Result<LoggerGuard, ConfigError> {
    if !config.console.is_enabled && !config.file.is_enabled {
        return Ok(LoggerGuard::default());
    }

    let console_layer = config.console.is_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(level_filter(&config.console.level))
    });

    let (file_layer, file_guard) = if config.file.is_enabled {
        let (writer, guard) = file_writer(&config.file)?;
        let layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(level_filter(&config.file.level));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::LoggerError(e.to_string()))?;

    Ok(LoggerGuard { file_guard })
}

/// Maps a configured level name onto a filter. Unknown names fall back to `info`.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "dpanic" | "panic" | "fatal" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn rotation_of(config: &FileLoggerConfig) -> Rotation {
    if !config.rotation.is_enabled {
        return Rotation::NEVER;
    }
    match config.rotation.period {
        RotationPeriod::Minutely => Rotation::MINUTELY,
        RotationPeriod::Hourly => Rotation::HOURLY,
        RotationPeriod::Daily => Rotation::DAILY,
        RotationPeriod::Never => Rotation::NEVER,
    }
}

/// Splits the configured log path into the appender's directory, prefix and suffix.
fn split_log_path(path: &Path) -> Result<(PathBuf, String, Option<String>), ConfigError> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ConfigError::LoggerError(e.to_string()))?
            .join(path)
    };

    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ConfigError::LoggerError(format!("log path has no file name: {}", path.display()))
        })?
        .to_string();
    let suffix = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_string);

    Ok((directory, prefix, suffix))
}

fn file_writer(config: &FileLoggerConfig) -> Result<(NonBlocking, WorkerGuard), ConfigError> {
    let (directory, prefix, suffix) = split_log_path(&config.path)?;

    std::fs::create_dir_all(&directory).map_err(|e| {
        ConfigError::LoggerError(format!("cannot create {}: {e}", directory.display()))
    })?;

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation_of(config))
        .filename_prefix(prefix);
    if let Some(suffix) = suffix {
        builder = builder.filename_suffix(suffix);
    }
    if config.rotation.is_enabled && config.rotation.max_files > 0 {
        builder = builder.max_log_files(config.rotation.max_files);
    }

    let appender = builder
        .build(&directory)
        .map_err(|e| ConfigError::LoggerError(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}
