//! Integration tests for rental lifecycle and access control
//!
//! Author: Sofiya Bot Team
//! Version: 0.1.0
//! Date: 2026-10-01

use std::sync::Arc;

use chrono::Duration;
use sofiya_core::{Clock, EntityType, ManualClock, RentalStatus, StorageConfig};
use sofiya_rental::{AccessController, AccessDecision, RentalManager};
use sofiya_store::Database;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    clock: Arc<ManualClock>,
    db: Arc<Database>,
    rentals: RentalManager,
    access: AccessController,
}

async fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::default());
    let config = StorageConfig {
        data_dir: dir.path().join("database"),
        ..StorageConfig::default()
    };
    let db = Arc::new(Database::open(config, clock.clone()).await.unwrap());
    let rentals = RentalManager::new(db.clone());
    let access = AccessController::new(db.clone(), rentals.clone(), 72);

    Fixture {
        _dir: dir,
        clock,
        db,
        rentals,
        access,
    }
}

#[tokio::test]
async fn test_create_extend_then_check_activity() {
    let f = fixture().await;
    let start = f.clock.now();

    f.rentals.create("G1", "basic", 72).await.unwrap();
    let extended = f.rentals.extend("G1", 24).await.unwrap().unwrap();
    assert_eq!(extended.end_date, start + Duration::hours(96));

    f.clock.set(start + Duration::hours(80));
    assert!(f.rentals.is_active("G1").await);

    f.clock.set(start + Duration::hours(100));
    assert!(!f.rentals.is_active("G1").await);
}

#[tokio::test]
async fn test_is_active_matches_stored_state() {
    let f = fixture().await;
    f.rentals.create("live", "basic", 10).await.unwrap();
    f.rentals.create("ending", "basic", 1).await.unwrap();
    f.clock.advance(Duration::hours(1));

    // Past its end date but not swept yet: still inactive.
    assert!(f.rentals.is_active("live").await);
    assert!(!f.rentals.is_active("ending").await);
    assert_eq!(
        f.rentals.rental("ending").await.unwrap().status,
        RentalStatus::Active
    );
    assert!(!f.rentals.is_active("absent").await);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let f = fixture().await;
    f.rentals.create("G1", "basic", 1).await.unwrap();
    f.rentals.create("G2", "basic", 1).await.unwrap();
    f.rentals.create("G3", "basic", 48).await.unwrap();
    f.clock.advance(Duration::hours(2));

    assert_eq!(f.rentals.sweep_expired().await.unwrap(), 2);
    assert_eq!(f.rentals.sweep_expired().await.unwrap(), 0);

    let expired = f.rentals.rental("G1").await.unwrap();
    assert_eq!(expired.status, RentalStatus::Expired);
    assert_eq!(expired.deactivated_at, Some(f.clock.now()));
    assert_eq!(
        f.rentals.rental("G3").await.unwrap().status,
        RentalStatus::Active
    );
}

#[tokio::test]
async fn test_create_reactivates_expired_rental() {
    let f = fixture().await;
    f.rentals.create("G1", "basic", 1).await.unwrap();
    f.clock.advance(Duration::hours(2));
    f.rentals.sweep_expired().await.unwrap();

    let renewed = f.rentals.create("G1", "month", 720).await.unwrap();

    assert_eq!(renewed.status, RentalStatus::Active);
    assert_eq!(renewed.plan, "month");
    assert!(renewed.deactivated_at.is_none());
    assert!(f.rentals.is_active("G1").await);
}

#[tokio::test]
async fn test_expiring_within() {
    let f = fixture().await;
    f.rentals.create("soon", "basic", 12).await.unwrap();
    f.rentals.create("later", "basic", 200).await.unwrap();

    let expiring = f.rentals.expiring_within(24).await;

    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].group_id, "soon");
}

#[tokio::test]
async fn test_trial_window_from_first_contact() {
    let f = fixture().await;
    let first = f.clock.now();

    assert_eq!(
        f.access.decide("G1").await,
        AccessDecision::FirstContact {
            ends_at: first + Duration::hours(72)
        }
    );
    assert_eq!(f.db.group("G1").await.unwrap().join_date, Some(first));

    f.clock.set(first + Duration::hours(72) - Duration::seconds(1));
    assert!(f.access.has_access("G1").await);

    f.clock.set(first + Duration::hours(72) + Duration::seconds(1));
    assert!(!f.access.has_access("G1").await);
    assert_eq!(f.db.group("G1").await.unwrap().join_date, Some(first));
}

#[tokio::test]
async fn test_rental_overrides_expired_trial() {
    let f = fixture().await;
    f.access.decide("G1").await;
    f.clock.advance(Duration::days(10));
    assert!(!f.access.has_access("G1").await);

    f.rentals.create("G1", "week", 168).await.unwrap();

    assert_eq!(f.access.decide("G1").await, AccessDecision::Rental);
}

#[tokio::test]
async fn test_existing_group_without_join_date_starts_trial() {
    let f = fixture().await;
    f.db
        .set_group("G1", serde_json::json!({ "name": "Migrated" }))
        .await
        .unwrap();

    assert!(matches!(
        f.access.decide("G1").await,
        AccessDecision::FirstContact { .. }
    ));
    let group = f.db.group("G1").await.unwrap();
    assert_eq!(group.name.as_deref(), Some("Migrated"));
    assert!(group.trial_started);
}

#[tokio::test]
async fn test_concurrent_first_contact_grants_once() {
    let f = fixture().await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let access = f.access.clone();
            tokio::spawn(async move { access.decide("G1").await })
        })
        .collect();

    let mut first_contacts = 0;
    for task in tasks {
        let decision = task.await.unwrap();
        assert!(decision.is_granted());
        if matches!(decision, AccessDecision::FirstContact { .. }) {
            first_contacts += 1;
        }
    }

    assert_eq!(first_contacts, 1);
    assert_eq!(f.db.len(EntityType::Groups).await, 1);
}

#[tokio::test]
async fn test_oversized_hour_counts_never_panic() {
    let f = fixture().await;

    assert!(f.rentals.create("G1", "basic", 10_000_000_000).await.is_err());
    f.rentals.create("G1", "basic", 24).await.unwrap();
    assert!(f.rentals.extend("G1", i64::MAX / 4000).await.is_err());
    assert!(f.rentals.is_active("G1").await);
    assert_eq!(f.rentals.expiring_within(i64::MAX).await.len(), 1);

    let access = AccessController::new(f.db.clone(), f.rentals.clone(), i64::MAX);
    assert!(matches!(
        access.decide("G2").await,
        AccessDecision::FirstContact { .. }
    ));
    f.clock.advance(Duration::days(3650));
    assert!(matches!(
        access.decide("G2").await,
        AccessDecision::Trial { .. }
    ));
}
