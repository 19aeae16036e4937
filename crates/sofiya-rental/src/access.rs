//! Group access decisions
//!
//! A group may use the service while it holds an active rental or while it
//! is inside the trial window that opens on first contact.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sofiya_core::EntityType;
use sofiya_store::{merge, Database, Outcome};
use tracing::{debug, info, instrument, warn};

use crate::RentalManager;

/// Why a group was or was not let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Active rental
    Rental,
    /// Inside the trial window that opened earlier
    Trial { ends_at: DateTime<Utc> },
    /// Group seen for the first time; its trial starts now
    FirstContact { ends_at: DateTime<Utc> },
    /// No rental and the trial is over
    Denied,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        !matches!(self, AccessDecision::Denied)
    }
}

/// Decides whether a group may use the service
#[derive(Debug, Clone)]
pub struct AccessController {
    db: Arc<Database>,
    rentals: RentalManager,
    trial_window: Duration,
}

impl AccessController {
    /// `trial_hours` beyond chrono's range saturates to the longest window
    pub fn new(db: Arc<Database>, rentals: RentalManager, trial_hours: i64) -> Self {
        Self {
            db,
            rentals,
            trial_window: Duration::try_hours(trial_hours).unwrap_or(Duration::MAX),
        }
    }

    pub fn trial_window(&self) -> Duration {
        self.trial_window
    }

    /// Shorthand for `decide(group).is_granted()`
    pub async fn has_access(&self, group_id: &str) -> bool {
        self.decide(group_id).await.is_granted()
    }

    /// Decide access for `group_id`, opening its trial on first contact
    ///
    /// The join-date check and the first-contact write share one exclusive
    /// region of the groups collection, so concurrent first contacts record
    /// exactly one join date. A failed write is logged and access is still
    /// granted; the join date stays in memory.
    #[instrument(skip(self))]
    pub async fn decide(&self, group_id: &str) -> AccessDecision {
        if self.rentals.is_active(group_id).await {
            return AccessDecision::Rental;
        }

        let now = self.db.clock().now();
        let trial_window = self.trial_window;
        let mut decision = AccessDecision::Denied;

        let result = self
            .db
            .transact(EntityType::Groups, |records| {
                let record = records
                    .entry(group_id.to_string())
                    .or_insert_with(|| Value::Object(Default::default()));

                match record.get("joinDate") {
                    Some(Value::String(raw)) => {
                        decision = match DateTime::parse_from_rfc3339(raw) {
                            Ok(joined) => {
                                let joined = joined.with_timezone(&Utc);
                                trial_decision(joined, now, trial_window)
                            }
                            Err(e) => {
                                warn!("⚠️ Unreadable joinDate for group {}: {}", group_id, e);
                                AccessDecision::Denied
                            }
                        };
                        Ok(Outcome::unchanged(()))
                    }
                    _ => {
                        let stamp = now.to_rfc3339();
                        merge(
                            record,
                            json!({
                                "id": group_id,
                                "joinDate": stamp,
                                "trialStarted": true,
                                "updatedAt": stamp,
                            }),
                        );
                        decision = AccessDecision::FirstContact {
                            ends_at: trial_end(now, trial_window),
                        };
                        Ok(Outcome::persist(()))
                    }
                }
            })
            .await;

        if let Err(e) = result {
            warn!("⚠️ Failed to persist first contact of group {}: {}", group_id, e);
        }

        match decision {
            AccessDecision::FirstContact { ends_at } => {
                info!("🆕 Trial started: group={} until={}", group_id, ends_at)
            }
            AccessDecision::Denied => debug!("Access denied for group {}", group_id),
            _ => {}
        }
        decision
    }
}

fn trial_end(joined: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    joined
        .checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn trial_decision(joined: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> AccessDecision {
    if now - joined <= window {
        AccessDecision::Trial {
            ends_at: trial_end(joined, window),
        }
    } else {
        AccessDecision::Denied
    }
}
