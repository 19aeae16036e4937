//! Logging System
//!
//! Console and daily-rolling file logging for the Sofiya service, plus the
//! retention trim for old log files.
//!
//! Author: Sofiya Bot Team
//! Version: 0.1.0
//! Date: 2026-10-02

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use sofiya_core::{utils::retention_cutoff, LoggingConfig, Result, SofiyaError};
use tokio::fs;
use tracing::{debug, info, warn};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the rolling log files
pub const LOG_FILE_PREFIX: &str = "sofiya.log";

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. `verbose` lowers the default
/// to `debug`. The returned guard must stay alive for file output to be
/// flushed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| SofiyaError::config(format!("Invalid log filter '{}': {}", level, e)))?;

    // stdout is reserved for the line transport.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = if config.file_logging {
        std::fs::create_dir_all(&config.directory)?;
        let appender =
            RollingFileAppender::new(Rotation::DAILY, &config.directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SofiyaError::Internal(format!("Failed to set global subscriber: {}", e)))?;

    debug!("🔧 Logging initialized at level {}", level);
    Ok(guard)
}

/// Remove rolled log files in `dir` older than `retention_days`
///
/// The age of a file comes from its date suffix (`sofiya.log.2024-01-31`),
/// falling back to its modification time. Returns the number removed.
pub async fn prune_old_logs(dir: &Path, retention_days: u32, now: DateTime<Utc>) -> Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let cutoff = retention_cutoff(now, retention_days);
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !entry.file_type().await?.is_file() || !name.starts_with(LOG_FILE_PREFIX) {
            continue;
        }

        let written = match log_file_date(name) {
            Some(date) => Some(date),
            None => entry
                .metadata()
                .await
                .and_then(|metadata| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from),
        };

        if written.is_some_and(|written| written < cutoff) {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("⚠️ Failed to remove log file {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        info!("🗑 Removed {} old log files", removed);
    }
    Ok(removed)
}

fn log_file_date(name: &str) -> Option<DateTime<Utc>> {
    let suffix = name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
    NaiveDate::parse_from_str(suffix, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;
    use test_log::test;

    #[test]
    fn test_log_file_date() {
        assert_eq!(
            log_file_date("sofiya.log.2024-01-31"),
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(log_file_date("sofiya.log"), None);
        assert_eq!(log_file_date("other.log.2024-01-31"), None);
    }

    #[test(tokio::test)]
    async fn test_prune_old_logs_keeps_recent_and_foreign_files() {
        let dir = tempdir().unwrap();
        for name in [
            "sofiya.log.2024-01-01",
            "sofiya.log.2024-01-09",
            "sofiya.log.2024-01-14",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "line\n").unwrap();
        }

        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let removed = prune_old_logs(dir.path(), 7, now).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!dir.path().join("sofiya.log.2024-01-01").exists());
        assert!(dir.path().join("sofiya.log.2024-01-09").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test(tokio::test)]
    async fn test_prune_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let removed = prune_old_logs(&dir.path().join("absent"), 7, now).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[test(tokio::test)]
    async fn test_prune_with_unbounded_retention_keeps_everything() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sofiya.log.1970-01-02"), "line\n").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let removed = prune_old_logs(dir.path(), u32::MAX, now).await.unwrap();

        assert_eq!(removed, 0);
        assert!(dir.path().join("sofiya.log.1970-01-02").exists());
    }
}
