//! Tracing setup: stdout and a daily rolling file under the log directory.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from `[logging]` in
//! the config, with optional per-target levels for renderer output.

use crate::{config::LoggingConfig, paths::AppDirs, CONSOLE_TARGET, REMOTE_TARGET};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "nwv.log";

/// Keeps the background file writer alive; logs are flushed when dropped.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

pub fn init_logging(config: &LoggingConfig, dirs: &AppDirs) -> Result<LoggingGuard, LoggingError> {
    let log_dir = dirs.log_dir();
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDirectory {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(directives)?,
        _ => parse_filter(filter_directives(config))?,
    };

    let (file, file_guard) = open_log_file(config, log_dir)?;
    let writer = if config.stdout {
        BoxMakeWriter::new(std::io::stdout.and(file))
    } else {
        BoxMakeWriter::new(file)
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(LoggingError::SubscriberInstall)?;

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialised");
    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn parse_filter(directives: String) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(&directives).map_err(|source| LoggingError::ParseLevel {
        level: directives,
        source,
    })
}

/// Global level plus per-target overrides for renderer output.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.as_filter_directive().to_string();
    if let Some(remote) = config.remote_level {
        for target in [REMOTE_TARGET, CONSOLE_TARGET] {
            directives.push_str(&format!(",{target}={}", remote.as_filter_directive()));
        }
    }
    directives
}

fn open_log_file(
    config: &LoggingConfig,
    log_dir: &Path,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let file_name = config.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE);
    prune_rotated_logs(log_dir, file_name, config.max_log_files.max(1))?;

    let appender = tracing_appender::rolling::daily(log_dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Delete all but the `keep` most recently modified files rotated from `file_name`.
fn prune_rotated_logs(dir: &Path, file_name: &str, keep: usize) -> Result<(), LoggingError> {
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut rotated: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|entry| is_rotation_of(&entry.file_name().to_string_lossy(), file_name))
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .collect();

    // Newest first.
    rotated.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in rotated.into_iter().skip(keep) {
        fs::remove_file(&path).map_err(|source| LoggingError::Cleanup { path, source })?;
    }

    Ok(())
}

/// `nwv.log` itself or a dated rotation such as `nwv.log.2026-01-04`.
fn is_rotation_of(name: &str, file_name: &str) -> bool {
    match name.strip_prefix(file_name) {
        Some(suffix) => suffix.is_empty() || suffix.starts_with('.'),
        None => false,
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid log filter '{level}': {source}")]
    ParseLevel {
        level: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    SubscriberInstall(Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to list log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to remove old log file {path}: {source}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}
