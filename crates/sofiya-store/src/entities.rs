//! Typed accessors over the raw record collections
//!
//! Records that no longer decode into their typed view are logged and
//! treated as absent by readers. Activity counters are the exception on
//! write: an undecodable counter fails the update and is left unchanged.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sofiya_core::{Activity, EntityType, GroupRecord, GroupSettings};
use tracing::warn;

use crate::{Database, Outcome, StoreError, StoreResult};

fn decode<T: DeserializeOwned>(entity: EntityType, key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(e) => {
            warn!("⚠️ Ignoring undecodable {} record '{}': {}", entity, key, e);
            None
        }
    }
}

fn encode<T: Serialize>(entity: EntityType, record: &T) -> StoreResult<Value> {
    serde_json::to_value(record).map_err(|e| StoreError::serialization(entity, e))
}

impl Database {
    /// Cached record decoded as `T`
    pub async fn get_as<T: DeserializeOwned>(&self, entity: EntityType, key: &str) -> Option<T> {
        let value = self.get(entity, key).await?;
        decode(entity, key, value)
    }

    /// Every decodable record of a type
    pub async fn all_as<T: DeserializeOwned>(&self, entity: EntityType) -> Vec<(String, T)> {
        self.all(entity)
            .await
            .into_iter()
            .filter_map(|(key, value)| {
                let typed = decode(entity, &key, value)?;
                Some((key, typed))
            })
            .collect()
    }

    pub async fn group(&self, group_id: &str) -> Option<GroupRecord> {
        self.get_as(EntityType::Groups, group_id).await
    }

    pub async fn groups(&self) -> Vec<(String, GroupRecord)> {
        self.all_as(EntityType::Groups).await
    }

    /// Merge `patch` into the group record
    pub async fn set_group(&self, group_id: &str, patch: Value) -> StoreResult<GroupRecord> {
        let merged = self.put(EntityType::Groups, group_id, patch).await?;
        Ok(decode(EntityType::Groups, group_id, merged).unwrap_or_default())
    }

    pub async fn delete_group(&self, group_id: &str) -> StoreResult<Option<Value>> {
        self.delete(EntityType::Groups, group_id).await
    }

    /// Raw user profile
    pub async fn user(&self, user_id: &str) -> Option<Value> {
        self.get(EntityType::Users, user_id).await
    }

    pub async fn set_user(&self, user_id: &str, patch: Value) -> StoreResult<Value> {
        self.put(EntityType::Users, user_id, patch).await
    }

    /// Settings of a group, falling back to the all-off baseline
    pub async fn group_settings(&self, group_id: &str) -> GroupSettings {
        self.get_as(EntityType::Settings, group_id)
            .await
            .unwrap_or_default()
    }

    /// Deep-merge a partial settings patch, e.g.
    /// `{"antiSpam": {"antiLink2": true}}`, keeping every other toggle
    pub async fn update_group_settings(
        &self,
        group_id: &str,
        patch: Value,
    ) -> StoreResult<GroupSettings> {
        let exists = self.get(EntityType::Settings, group_id).await.is_some();
        if !exists {
            let baseline = encode(EntityType::Settings, &GroupSettings::default())?;
            self.transact(EntityType::Settings, |records| {
                records.entry(group_id.to_string()).or_insert(baseline);
                Ok(Outcome::unchanged(()))
            })
            .await?;
        }

        let merged = self.put(EntityType::Settings, group_id, patch).await?;
        Ok(decode(EntityType::Settings, group_id, merged).unwrap_or_default())
    }

    /// Count one message from `user_id` in `group_id`
    ///
    /// The counter lives in the cache; the activity collection is written
    /// every `activity_flush_every` messages of that member and on
    /// [`Database::flush_all`].
    pub async fn record_activity(&self, group_id: &str, user_id: &str) -> StoreResult<Activity> {
        let now = self.clock().now();
        let flush_every = self.config().activity_flush_every.max(1);
        let key = Activity::key(group_id, user_id);

        self.transact(EntityType::Activity, |records| {
            let mut activity = stored_activity(records.get(&key), &key, group_id, user_id)?;

            activity.message_count += 1;
            activity.first_seen.get_or_insert(now);
            activity.last_seen = Some(now);

            records.insert(key.clone(), encode(EntityType::Activity, &activity)?);
            let flush = activity.message_count % flush_every == 0;
            Ok(Outcome::when(flush, activity))
        })
        .await
    }

    /// Note a member joining `group_id` without counting a message
    pub async fn record_join(&self, group_id: &str, user_id: &str) -> StoreResult<Activity> {
        let now = self.clock().now();
        let key = Activity::key(group_id, user_id);

        self.transact(EntityType::Activity, |records| {
            let mut activity = stored_activity(records.get(&key), &key, group_id, user_id)?;

            activity.first_seen.get_or_insert(now);
            activity.last_seen = Some(now);

            records.insert(key.clone(), encode(EntityType::Activity, &activity)?);
            Ok(Outcome::persist(activity))
        })
        .await
    }

    pub async fn activity(&self, group_id: &str, user_id: &str) -> Option<Activity> {
        self.get_as(EntityType::Activity, &Activity::key(group_id, user_id))
            .await
    }

    /// Members of `group_id` with no message within `window`, oldest first
    pub async fn inactive_users(&self, group_id: &str, window: Duration) -> Vec<Activity> {
        let cutoff = self
            .clock()
            .now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut inactive: Vec<Activity> = self
            .all_as::<Activity>(EntityType::Activity)
            .await
            .into_iter()
            .map(|(_, activity)| activity)
            .filter(|activity| activity.group_id == group_id)
            .filter(|activity| last_seen_before(activity.last_seen, cutoff))
            .collect();

        inactive.sort_by_key(|activity| activity.last_seen);
        inactive
    }
}

/// Counter to build on; an undecodable record is an error so it stays as is
fn stored_activity(
    stored: Option<&Value>,
    key: &str,
    group_id: &str,
    user_id: &str,
) -> StoreResult<Activity> {
    let Some(value) = stored else {
        return Ok(Activity::empty(group_id, user_id));
    };
    serde_json::from_value(value.clone()).map_err(|e| StoreError::Malformed {
        entity: EntityType::Activity,
        reason: format!("record '{}' does not decode: {}", key, e),
    })
}

fn last_seen_before(last_seen: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    last_seen.map_or(true, |seen| seen < cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sofiya_core::{ManualClock, StorageConfig};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn open_store(clock: Arc<ManualClock>) -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            data_dir: dir.path().to_path_buf(),
            activity_flush_every: 3,
            ..StorageConfig::default()
        };
        let db = Database::open(config, clock).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_settings_baseline_and_partial_update() {
        let (_dir, db) = open_store(Arc::new(ManualClock::default())).await;
        assert_eq!(db.group_settings("g1").await, GroupSettings::default());

        db.update_group_settings("g1", json!({ "antiSpam": { "antiLink": true } }))
            .await
            .unwrap();
        let settings = db
            .update_group_settings("g1", json!({ "antiSpam": { "antiLink2": true } }))
            .await
            .unwrap();

        assert!(settings.anti_spam.anti_link);
        assert!(settings.anti_spam.anti_link2);
        assert!(!settings.moderation.welcome);
        assert!(settings.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_set_group_stamps_id() {
        let (_dir, db) = open_store(Arc::new(ManualClock::default())).await;

        let group = db
            .set_group("g1", json!({ "name": "Chess", "participants": 12 }))
            .await
            .unwrap();

        assert_eq!(group.id.as_deref(), Some("g1"));
        assert_eq!(group.participants, Some(12));
        assert_eq!(db.groups().await.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_record_is_absent() {
        let (_dir, db) = open_store(Arc::new(ManualClock::default())).await;

        db.replace(EntityType::Groups, "g1", json!({ "participants": "many" }))
            .await
            .unwrap();

        assert!(db.group("g1").await.is_none());
        assert!(db.get(EntityType::Groups, "g1").await.is_some());
    }

    #[tokio::test]
    async fn test_activity_counts_and_flushes_periodically() {
        let (_dir, db) = open_store(Arc::new(ManualClock::default())).await;
        let path = db.data_dir().join("activity.json");

        db.record_activity("g1", "u1").await.unwrap();
        db.record_activity("g1", "u1").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");

        let activity = db.record_activity("g1", "u1").await.unwrap();
        assert_eq!(activity.message_count, 3);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"messageCount\": 3"));
    }

    #[tokio::test]
    async fn test_join_keeps_message_count() {
        let (_dir, db) = open_store(Arc::new(ManualClock::default())).await;

        db.record_activity("g1", "u1").await.unwrap();
        let joined = db.record_join("g1", "u1").await.unwrap();

        assert_eq!(joined.message_count, 1);
        let fresh = db.record_join("g1", "u2").await.unwrap();
        assert_eq!(fresh.message_count, 0);
        assert!(fresh.first_seen.is_some());
    }

    #[tokio::test]
    async fn test_inactive_users() {
        let clock = Arc::new(ManualClock::default());
        let (_dir, db) = open_store(clock.clone()).await;

        db.record_activity("g1", "quiet").await.unwrap();
        clock.advance(Duration::days(10));
        db.record_activity("g1", "chatty").await.unwrap();
        db.record_activity("g2", "elsewhere").await.unwrap();

        let inactive = db.inactive_users("g1", Duration::days(7)).await;

        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].user_id, "quiet");

        let everyone = db.inactive_users("g1", Duration::MAX).await;
        assert!(everyone.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_activity_is_kept_untouched() {
        let (_dir, db) = open_store(Arc::new(ManualClock::default())).await;
        let key = Activity::key("g1", "u1");
        let raw = json!({ "messageCount": "many" });
        db.replace(EntityType::Activity, &key, raw.clone())
            .await
            .unwrap();

        let counted = db.record_activity("g1", "u1").await;
        assert!(matches!(counted, Err(StoreError::Malformed { .. })));
        assert!(db.record_join("g1", "u1").await.is_err());

        assert_eq!(db.get(EntityType::Activity, &key).await, Some(raw));
        assert_eq!(db.record_activity("g1", "u2").await.unwrap().message_count, 1);
    }
}
