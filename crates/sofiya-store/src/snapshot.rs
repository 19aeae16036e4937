//! Snapshot backups of the collection files
//!
//! Author: Sofiya Bot Team
//! Version: 0.1.0
//! Date: 2026-09-30
//!
//! Each snapshot is a directory named after the instant it was taken
//! (`YYYY-MM-DD_HH-mm-ss`) holding a copy of every collection file.

use std::{path::PathBuf, time::SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sofiya_core::{
    utils::{backup_stamp, parse_backup_stamp, retention_cutoff},
    EntityType,
};
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::{Database, StoreError, StoreResult};

/// Information about a snapshot directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub taken_at: DateTime<Utc>,
}

/// Result of one snapshot run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotReport {
    /// Directory the snapshot was written to
    pub path: PathBuf,
    /// Collections copied
    pub copied: usize,
    /// Old snapshots removed afterwards
    pub pruned: usize,
}

impl Database {
    /// Copy every collection file into a fresh snapshot directory, then
    /// prune snapshots past retention
    ///
    /// Each file is copied while its collection is locked, so a snapshot
    /// never captures a half-written file.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> StoreResult<SnapshotReport> {
        let now = self.clock().now();
        let target = self.backup_root().join(backup_stamp(now));
        fs::create_dir_all(&target)
            .await
            .map_err(|e| StoreError::io(&target, e))?;

        let mut copied = 0;
        for entity in EntityType::ALL {
            let source = self.collection_path(entity);
            let destination = target.join(entity.file_name());

            let _records = self.lock(entity).await;
            match fs::copy(source, &destination).await {
                Ok(_) => copied += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("⚠️ No {} file to back up", entity);
                }
                Err(e) => return Err(StoreError::io(&destination, e)),
            }
        }

        info!("✅ Backup created: {} ({} collections)", target.display(), copied);

        let pruned = self.prune_backups().await?;
        Ok(SnapshotReport {
            path: target,
            copied,
            pruned,
        })
    }

    /// Every snapshot under the backup root, oldest first
    pub async fn list_backups(&self) -> StoreResult<Vec<BackupInfo>> {
        let root = self.backup_root();
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(root, e)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(root, e))?
        {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_dir() => metadata,
                _ => continue,
            };

            let taken_at = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_backup_stamp)
                .or_else(|| metadata.modified().ok().map(system_time_to_utc));

            match taken_at {
                Some(taken_at) => backups.push(BackupInfo { path, taken_at }),
                None => warn!("⚠️ Cannot date backup directory {}", path.display()),
            }
        }

        backups.sort_by_key(|backup| backup.taken_at);
        Ok(backups)
    }

    /// Remove snapshots older than the retention window; returns how many
    /// were removed. A snapshot that cannot be removed is logged and skipped.
    #[instrument(skip(self))]
    pub async fn prune_backups(&self) -> StoreResult<usize> {
        let cutoff = retention_cutoff(self.clock().now(), self.config().backup_retention_days);

        let mut removed = 0;
        for backup in self.list_backups().await? {
            if backup.taken_at >= cutoff {
                continue;
            }
            match fs::remove_dir_all(&backup.path).await {
                Ok(()) => {
                    info!("🗑 Removing old backup: {}", backup.path.display());
                    removed += 1;
                }
                Err(e) => warn!("⚠️ Failed to remove backup {}: {}", backup.path.display(), e),
            }
        }

        Ok(removed)
    }
}

fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
