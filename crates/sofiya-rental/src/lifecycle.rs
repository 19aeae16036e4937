//! Rental lifecycle
//!
//! A group moves `NoRental -> Active -> Expired`. Only `create` puts a group
//! back into `Active`; there is no other way out of `Expired`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sofiya_core::{utils::shift_hours, EntityType, Rental, RentalStatus};
use sofiya_store::{Database, Outcome, Records, StoreError};
use tracing::{debug, info, instrument, warn};

use crate::{RentalError, RentalResult};

/// What `extend` found inside its transaction
enum Extension {
    Missing,
    OutOfRange,
    Extended(Rental),
}

/// Creates, extends, expires and deletes rentals
#[derive(Debug, Clone)]
pub struct RentalManager {
    db: Arc<Database>,
}

impl RentalManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn now(&self) -> DateTime<Utc> {
        self.db.clock().now()
    }

    /// Start a fresh rental, overwriting whatever the group had before
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        group_id: &str,
        plan: &str,
        duration_hours: i64,
    ) -> RentalResult<Rental> {
        if plan.trim().is_empty() {
            return Err(RentalError::InvalidPlan);
        }
        if duration_hours <= 0 {
            return Err(RentalError::InvalidDuration(duration_hours));
        }

        let now = self.now();
        let end = shift_hours(now, duration_hours)
            .ok_or(RentalError::InvalidDuration(duration_hours))?;
        let rental = Rental::new(group_id, plan, now, end);
        let record = encode(&rental)?;

        self.db
            .transact(EntityType::Rentals, |records| {
                records.insert(group_id.to_string(), record);
                Ok(Outcome::persist(()))
            })
            .await?;

        info!(
            "🏷️ Rental created: group={} plan={} until={}",
            group_id, rental.plan, rental.end_date
        );
        Ok(rental)
    }

    /// Push the end date out by `hours`, counted from the current end date
    /// even when that lies in the past. `None` when the group has no rental.
    ///
    /// An extension pushing the end date out of range is rejected and the
    /// rental is left unchanged.
    #[instrument(skip(self))]
    pub async fn extend(&self, group_id: &str, hours: i64) -> RentalResult<Option<Rental>> {
        if hours <= 0 {
            return Err(RentalError::InvalidDuration(hours));
        }

        let now = self.now();
        let outcome = self
            .db
            .transact(EntityType::Rentals, |records| {
                let Some(mut rental) = decode_entry(records, group_id) else {
                    return Ok(Outcome::unchanged(Extension::Missing));
                };
                let Some(end) = shift_hours(rental.end_date, hours) else {
                    return Ok(Outcome::unchanged(Extension::OutOfRange));
                };

                rental.end_date = end;
                rental.updated_at = Some(now);
                records.insert(group_id.to_string(), encode(&rental)?);
                Ok(Outcome::persist(Extension::Extended(rental)))
            })
            .await?;

        let extended = match outcome {
            Extension::Missing => None,
            Extension::OutOfRange => return Err(RentalError::InvalidDuration(hours)),
            Extension::Extended(rental) => Some(rental),
        };

        match &extended {
            Some(rental) => info!(
                "🏷️ Rental extended: group={} hours={} until={}",
                group_id, hours, rental.end_date
            ),
            None => debug!("No rental to extend for group {}", group_id),
        }
        Ok(extended)
    }

    /// Whether the group holds an active, unexpired rental right now
    pub async fn is_active(&self, group_id: &str) -> bool {
        let now = self.now();
        self.rental(group_id)
            .await
            .is_some_and(|rental| rental.is_active_at(now))
    }

    pub async fn rental(&self, group_id: &str) -> Option<Rental> {
        self.db.get_as(EntityType::Rentals, group_id).await
    }

    /// Every rental on record
    pub async fn rentals(&self) -> Vec<Rental> {
        self.db
            .all_as(EntityType::Rentals)
            .await
            .into_iter()
            .map(|(_, rental)| rental)
            .collect()
    }

    /// Mark every active rental whose end date has passed as expired.
    /// Returns how many changed; the collection is written once at most.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> RentalResult<usize> {
        let now = self.now();
        let expired = self
            .db
            .transact(EntityType::Rentals, |records| {
                let mut expired = Vec::new();
                for (group_id, value) in records.iter_mut() {
                    let Ok(mut rental) = serde_json::from_value::<Rental>(value.clone()) else {
                        continue;
                    };
                    if rental.status != RentalStatus::Active || rental.end_date >= now {
                        continue;
                    }

                    rental.status = RentalStatus::Expired;
                    rental.deactivated_at = Some(now);
                    *value = encode(&rental)?;
                    expired.push(group_id.clone());
                }
                Ok(Outcome::when(!expired.is_empty(), expired))
            })
            .await?;

        for group_id in &expired {
            info!("⌛ Rental expired: group={}", group_id);
        }
        if !expired.is_empty() {
            info!("✅ Deactivated {} expired rentals", expired.len());
        }
        Ok(expired.len())
    }

    /// Active rentals ending before `now + hours`, soonest first
    ///
    /// A window reaching past chrono's range covers every active rental.
    pub async fn expiring_within(&self, hours: i64) -> Vec<Rental> {
        let cutoff = shift_hours(self.now(), hours).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut expiring: Vec<Rental> = self
            .rentals()
            .await
            .into_iter()
            .filter(|rental| rental.status == RentalStatus::Active && rental.end_date < cutoff)
            .collect();
        expiring.sort_by_key(|rental| rental.end_date);
        expiring
    }

    /// Remove the rental outright
    #[instrument(skip(self))]
    pub async fn delete(&self, group_id: &str) -> RentalResult<Option<Rental>> {
        let removed = self.db.delete(EntityType::Rentals, group_id).await?;
        let removed = removed.and_then(|value| serde_json::from_value::<Rental>(value).ok());
        if removed.is_some() {
            info!("🗑 Rental deleted: group={}", group_id);
        }
        Ok(removed)
    }
}

fn encode(rental: &Rental) -> Result<Value, StoreError> {
    serde_json::to_value(rental).map_err(|e| StoreError::serialization(EntityType::Rentals, e))
}

fn decode_entry(records: &Records, group_id: &str) -> Option<Rental> {
    let value = records.get(group_id)?.clone();
    match serde_json::from_value(value) {
        Ok(rental) => Some(rental),
        Err(e) => {
            warn!("⚠️ Ignoring undecodable rental for group {}: {}", group_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sofiya_core::{Clock, ManualClock, StorageConfig};
    use tempfile::{tempdir, TempDir};

    async fn manager() -> (TempDir, Arc<ManualClock>, RentalManager) {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::default());
        let config = StorageConfig {
            data_dir: dir.path().to_path_buf(),
            ..StorageConfig::default()
        };
        let db = Database::open(config, clock.clone()).await.unwrap();
        (dir, clock, RentalManager::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn test_create_and_query() {
        let (_dir, clock, rentals) = manager().await;

        let rental = rentals.create("G1", "basic", 72).await.unwrap();

        assert_eq!(rental.start_date, clock.now());
        assert_eq!(rental.end_date - rental.start_date, Duration::hours(72));
        assert_eq!(rental.status, RentalStatus::Active);
        assert!(rentals.is_active("G1").await);
        assert!(!rentals.is_active("G2").await);
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let (_dir, _clock, rentals) = manager().await;

        assert!(matches!(
            rentals.create("G1", "basic", 0).await,
            Err(RentalError::InvalidDuration(0))
        ));
        assert!(matches!(
            rentals.create("G1", "  ", 24).await,
            Err(RentalError::InvalidPlan)
        ));

        rentals.create("G1", "basic", 24).await.unwrap();
        assert!(matches!(
            rentals.extend("G1", -5).await,
            Err(RentalError::InvalidDuration(-5))
        ));
    }

    #[tokio::test]
    async fn test_extend_is_additive_to_end_date() {
        let (_dir, clock, rentals) = manager().await;
        let created = rentals.create("G1", "basic", 1).await.unwrap();

        clock.advance(Duration::hours(5));
        let extended = rentals.extend("G1", 2).await.unwrap().unwrap();

        // Counted from the old end date, so the rental is still over.
        assert_eq!(extended.end_date, created.end_date + Duration::hours(2));
        assert_eq!(extended.updated_at, Some(clock.now()));
        assert!(!rentals.is_active("G1").await);
    }

    #[tokio::test]
    async fn test_out_of_range_hours_are_rejected() {
        let (_dir, _clock, rentals) = manager().await;

        assert!(matches!(
            rentals.create("G1", "basic", 10_000_000_000).await,
            Err(RentalError::InvalidDuration(10_000_000_000))
        ));
        assert!(rentals.rental("G1").await.is_none());

        let created = rentals.create("G1", "basic", 24).await.unwrap();
        let huge = i64::MAX / 4000;
        assert!(matches!(
            rentals.extend("G1", huge).await,
            Err(RentalError::InvalidDuration(h)) if h == huge
        ));
        assert!(matches!(
            rentals.extend("G1", 10_000_000_000).await,
            Err(RentalError::InvalidDuration(_))
        ));
        assert_eq!(rentals.rental("G1").await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_expiring_within_huge_window_covers_all_active() {
        let (_dir, _clock, rentals) = manager().await;
        rentals.create("G1", "basic", 24).await.unwrap();
        rentals.create("G2", "basic", 720).await.unwrap();

        assert_eq!(rentals.expiring_within(i64::MAX).await.len(), 2);
    }

    #[tokio::test]
    async fn test_extend_missing_returns_none() {
        let (_dir, _clock, rentals) = manager().await;
        assert!(rentals.extend("nobody", 24).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_hard() {
        let (_dir, _clock, rentals) = manager().await;
        rentals.create("G1", "basic", 24).await.unwrap();

        assert!(rentals.delete("G1").await.unwrap().is_some());
        assert!(rentals.rental("G1").await.is_none());
        assert!(rentals.delete("G1").await.unwrap().is_none());
    }
}
