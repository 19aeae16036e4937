// =============================================================================
// Sofiya - Record Store Module
// =============================================================================
//
// Author: Sofiya Bot Team
// Date: 2026-09-29
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Embedded record store for the Sofiya moderation bot. This module provides:
//   - One JSON file per entity type (groups, users, rentals, settings, activity)
//   - An in-memory cache that is authoritative for reads
//   - Whole-collection writes after every mutation
//   - Timestamped snapshot backups with retention
//
// Concurrency:
//   • One async mutex per entity type guards its cache slice and file writes
//   • Read-modify-write sequences run inside `Database::transact`
//   • Different entity types never contend
//
// =============================================================================

#![forbid(unsafe_code)]

use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use sofiya_core::{EntityType, SharedClock, StorageConfig};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, instrument, warn};

pub mod entities;
pub mod error;
pub mod merge;
pub mod snapshot;

pub use error::{StoreError, StoreResult};
pub use merge::merge;
pub use snapshot::{BackupInfo, SnapshotReport};

/// Records of one entity type, keyed by record id
pub type Records = HashMap<String, Value>;

/// Result of a closure run inside [`Database::transact`]
#[derive(Debug)]
pub struct Outcome<R> {
    value: R,
    persist: bool,
}

impl<R> Outcome<R> {
    /// Collection changed; write it before returning
    pub fn persist(value: R) -> Self {
        Self {
            value,
            persist: true,
        }
    }

    /// Nothing to write
    pub fn unchanged(value: R) -> Self {
        Self {
            value,
            persist: false,
        }
    }

    /// Persist only when `changed` is true
    pub fn when(changed: bool, value: R) -> Self {
        Self {
            value,
            persist: changed,
        }
    }
}

/// Per-type load result
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// Entity types read successfully, with their record counts
    pub loaded: Vec<(EntityType, usize)>,
    /// Entity types that failed to load and were reset to empty
    pub failed: Vec<EntityType>,
}

/// Cache slice and file of one entity type
#[derive(Debug)]
struct Collection {
    entity: EntityType,
    path: PathBuf,
    records: Mutex<Records>,
}

impl Collection {
    fn new(entity: EntityType, data_dir: &Path) -> Self {
        Self {
            entity,
            path: data_dir.join(entity.file_name()),
            records: Mutex::new(Records::new()),
        }
    }

    /// Write the whole collection via a sibling temp file and rename
    async fn write(&self, records: &Records) -> StoreResult<()> {
        let ordered: BTreeMap<&String, &Value> = records.iter().collect();
        let body = serde_json::to_vec_pretty(&ordered)
            .map_err(|e| StoreError::serialization(self.entity, e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!("💾 Wrote {} {} records", records.len(), self.entity);
        Ok(())
    }

    /// Read the collection file; `None` when it does not exist
    async fn read(&self) -> StoreResult<Option<Records>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::serialization(self.entity, e))?;

        match value {
            Value::Object(map) => Ok(Some(map.into_iter().collect())),
            other => Err(StoreError::Malformed {
                entity: self.entity,
                reason: format!("expected an object, found {}", json_kind(&other)),
            }),
        }
    }
}

#[derive(Debug)]
struct Collections {
    groups: Collection,
    users: Collection,
    rentals: Collection,
    settings: Collection,
    activity: Collection,
}

impl Collections {
    fn new(data_dir: &Path) -> Self {
        Self {
            groups: Collection::new(EntityType::Groups, data_dir),
            users: Collection::new(EntityType::Users, data_dir),
            rentals: Collection::new(EntityType::Rentals, data_dir),
            settings: Collection::new(EntityType::Settings, data_dir),
            activity: Collection::new(EntityType::Activity, data_dir),
        }
    }

    fn get(&self, entity: EntityType) -> &Collection {
        match entity {
            EntityType::Groups => &self.groups,
            EntityType::Users => &self.users,
            EntityType::Rentals => &self.rentals,
            EntityType::Settings => &self.settings,
            EntityType::Activity => &self.activity,
        }
    }
}

/// Cached record store
///
/// Created once at startup and shared as `Arc<Database>` by every component.
#[derive(Debug)]
pub struct Database {
    config: StorageConfig,
    backup_root: PathBuf,
    clock: SharedClock,
    collections: Collections,
}

impl Database {
    /// Prepare the directory structure, seed missing collection files and
    /// load every collection into the cache
    #[instrument(skip(clock))]
    pub async fn open(config: StorageConfig, clock: SharedClock) -> StoreResult<Self> {
        let backup_root = config.backup_root();
        for dir in [&config.data_dir, &backup_root] {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::Startup {
                    path: dir.clone(),
                    source,
                })?;
        }

        let db = Self {
            collections: Collections::new(&config.data_dir),
            backup_root,
            clock,
            config,
        };

        db.seed_missing_files().await?;
        let report = db.load().await;
        info!(
            "✅ Database initialized: {} collections loaded, {} reset",
            report.loaded.len(),
            report.failed.len()
        );

        Ok(db)
    }

    async fn seed_missing_files(&self) -> StoreResult<()> {
        for entity in EntityType::ALL {
            let path = &self.collections.get(entity).path;
            let exists = fs::try_exists(path)
                .await
                .map_err(|source| StoreError::Startup {
                    path: path.clone(),
                    source,
                })?;
            if !exists {
                fs::write(path, b"{}")
                    .await
                    .map_err(|source| StoreError::Startup {
                        path: path.clone(),
                        source,
                    })?;
                debug!("📂 Created empty {} collection", entity);
            }
        }
        Ok(())
    }

    /// Reload every collection from disk
    ///
    /// A collection that cannot be read or parsed is reset to empty and
    /// reported; the remaining collections load normally.
    pub async fn load(&self) -> LoadReport {
        let mut report = LoadReport::default();

        for entity in EntityType::ALL {
            let collection = self.collections.get(entity);
            let mut records = collection.records.lock().await;

            match collection.read().await {
                Ok(Some(loaded)) => {
                    *records = loaded;
                    report.loaded.push((entity, records.len()));
                }
                Ok(None) => {
                    records.clear();
                    report.loaded.push((entity, 0));
                }
                Err(e) => {
                    warn!("⚠️ Failed to load {} data, starting empty: {}", entity, e);
                    records.clear();
                    report.failed.push(entity);
                }
            }
        }

        report
    }

    /// Cached record, never touches disk
    pub async fn get(&self, entity: EntityType, key: &str) -> Option<Value> {
        self.collections
            .get(entity)
            .records
            .lock()
            .await
            .get(key)
            .cloned()
    }

    /// Every cached record of a type
    pub async fn all(&self, entity: EntityType) -> Vec<(String, Value)> {
        self.collections
            .get(entity)
            .records
            .lock()
            .await
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Number of cached records of a type
    pub async fn len(&self, entity: EntityType) -> usize {
        self.collections.get(entity).records.lock().await.len()
    }

    /// Run `f` with exclusive access to one collection
    ///
    /// The collection is written once after `f` returns when it asked to
    /// persist. The cache keeps the mutation even if that write fails.
    pub async fn transact<R, F>(&self, entity: EntityType, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Records) -> StoreResult<Outcome<R>>,
    {
        let collection = self.collections.get(entity);
        let mut records = collection.records.lock().await;

        let Outcome { value, persist } = f(&mut records)?;
        if persist {
            if let Err(e) = collection.write(&records).await {
                warn!("❌ Failed to save {} data: {}", entity, e);
                return Err(e);
            }
        }

        Ok(value)
    }

    /// Deep-merge `patch` into the record (creating it when absent), stamp
    /// `id` and `updatedAt`, and persist. Returns the merged record.
    pub async fn put(&self, entity: EntityType, key: &str, patch: Value) -> StoreResult<Value> {
        let now = self.clock.now();
        self.transact(entity, |records| {
            let record = records
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            merge(record, patch);
            if let Value::Object(map) = record {
                map.insert("id".to_string(), Value::String(key.to_string()));
                map.insert("updatedAt".to_string(), Value::String(now.to_rfc3339()));
            }
            Ok(Outcome::persist(record.clone()))
        })
        .await
    }

    /// Overwrite the record without merging and persist
    pub async fn replace(&self, entity: EntityType, key: &str, record: Value) -> StoreResult<()> {
        self.transact(entity, |records| {
            records.insert(key.to_string(), record);
            Ok(Outcome::persist(()))
        })
        .await
    }

    /// Remove the record and persist; returns what was removed
    pub async fn delete(&self, entity: EntityType, key: &str) -> StoreResult<Option<Value>> {
        self.transact(entity, |records| {
            let removed = records.remove(key);
            Ok(Outcome::when(removed.is_some(), removed))
        })
        .await
    }

    /// Write one collection's cache to disk
    pub async fn flush(&self, entity: EntityType) -> StoreResult<()> {
        self.transact(entity, |_| Ok(Outcome::persist(()))).await
    }

    /// Write every collection, returning the first failure after trying all
    pub async fn flush_all(&self) -> StoreResult<()> {
        let mut first_error = None;
        for entity in EntityType::ALL {
            if let Err(e) = self.flush(entity).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Data directory holding the collection files
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Root directory of snapshot backups
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Storage configuration in use
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Clock used for timestamps
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    fn collection_path(&self, entity: EntityType) -> &Path {
        &self.collections.get(entity).path
    }

    /// Hold a collection's lock without touching its records
    async fn lock(&self, entity: EntityType) -> tokio::sync::MutexGuard<'_, Records> {
        self.collections.get(entity).records.lock().await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sofiya_core::ManualClock;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn open_store() -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            data_dir: dir.path().join("database"),
            ..StorageConfig::default()
        };
        let db = Database::open(config, Arc::new(ManualClock::default()))
            .await
            .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_open_seeds_empty_collections() {
        let (_dir, db) = open_store().await;

        for entity in EntityType::ALL {
            let contents = std::fs::read_to_string(db.collection_path(entity)).unwrap();
            assert_eq!(contents, "{}");
            assert_eq!(db.len(entity).await, 0);
        }
        assert!(db.backup_root().is_dir());
    }

    #[tokio::test]
    async fn test_put_merges_and_persists() {
        let (_dir, db) = open_store().await;

        db.put(EntityType::Users, "u1", json!({ "name": "Ann", "lang": "ru" }))
            .await
            .unwrap();
        let merged = db
            .put(EntityType::Users, "u1", json!({ "lang": "en" }))
            .await
            .unwrap();

        assert_eq!(merged["name"], "Ann");
        assert_eq!(merged["lang"], "en");
        assert!(merged["updatedAt"].is_string());

        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(db.collection_path(EntityType::Users)).unwrap())
                .unwrap();
        assert_eq!(on_disk["u1"]["lang"], "en");
    }

    #[tokio::test]
    async fn test_replace_does_not_merge() {
        let (_dir, db) = open_store().await;

        db.put(EntityType::Rentals, "g1", json!({ "plan": "week", "extra": 1 }))
            .await
            .unwrap();
        db.replace(EntityType::Rentals, "g1", json!({ "plan": "month" }))
            .await
            .unwrap();

        assert_eq!(
            db.get(EntityType::Rentals, "g1").await,
            Some(json!({ "plan": "month" }))
        );
    }

    #[tokio::test]
    async fn test_delete_absent_is_not_an_error() {
        let (_dir, db) = open_store().await;

        assert_eq!(db.delete(EntityType::Rentals, "missing").await.unwrap(), None);

        db.replace(EntityType::Rentals, "g1", json!({})).await.unwrap();
        assert!(db.delete(EntityType::Rentals, "g1").await.unwrap().is_some());
        assert!(db.get(EntityType::Rentals, "g1").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_collection_resets_only_itself() {
        let (_dir, db) = open_store().await;

        db.put(EntityType::Groups, "g1", json!({ "name": "kept" }))
            .await
            .unwrap();
        db.put(EntityType::Rentals, "g1", json!({ "plan": "lost" }))
            .await
            .unwrap();
        std::fs::write(db.collection_path(EntityType::Rentals), "{ truncated").unwrap();
        std::fs::write(db.collection_path(EntityType::Settings), "[1, 2]").unwrap();

        let report = db.load().await;

        assert_eq!(report.failed, vec![EntityType::Rentals, EntityType::Settings]);
        assert_eq!(db.len(EntityType::Rentals).await, 0);
        assert_eq!(
            db.get(EntityType::Groups, "g1").await.unwrap()["name"],
            "kept"
        );
    }

    #[tokio::test]
    async fn test_unpersisted_transaction_stays_in_cache_only() {
        let (_dir, db) = open_store().await;

        db.transact(EntityType::Activity, |records| {
            records.insert("g:u".to_string(), json!({ "messageCount": 1 }));
            Ok(Outcome::unchanged(()))
        })
        .await
        .unwrap();

        assert!(db.get(EntityType::Activity, "g:u").await.is_some());
        let on_disk = std::fs::read_to_string(db.collection_path(EntityType::Activity)).unwrap();
        assert_eq!(on_disk, "{}");

        db.flush_all().await.unwrap();
        let on_disk = std::fs::read_to_string(db.collection_path(EntityType::Activity)).unwrap();
        assert!(on_disk.contains("messageCount"));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_cache() {
        let (_dir, db) = open_store().await;

        // A directory where the temp file should go makes the write fail.
        let tmp = db.collection_path(EntityType::Users).with_extension("json.tmp");
        std::fs::create_dir_all(&tmp).unwrap();

        let result = db.put(EntityType::Users, "u1", json!({ "name": "Ann" })).await;

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(db.get(EntityType::Users, "u1").await.unwrap()["name"], "Ann");
    }
}
