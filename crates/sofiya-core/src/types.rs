//! Persisted entity records
//!
//! Records are stored as JSON objects with camelCase keys. The structs here
//! are typed views over those objects; unknown fields in a stored record are
//! ignored on read.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The five entity collections owned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Groups the bot has seen
    Groups,
    /// User profiles
    Users,
    /// Rental entitlements keyed by group
    Rentals,
    /// Per-group moderation toggles
    Settings,
    /// Per-member activity counters
    Activity,
}

impl EntityType {
    /// Every entity type, in load order
    pub const ALL: [EntityType; 5] = [
        EntityType::Groups,
        EntityType::Users,
        EntityType::Rentals,
        EntityType::Settings,
        EntityType::Activity,
    ];

    /// Collection name, also the file stem on disk
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Groups => "groups",
            EntityType::Users => "users",
            EntityType::Rentals => "rentals",
            EntityType::Settings => "settings",
            EntityType::Activity => "activity",
        }
    }

    /// File name of the collection inside the data directory
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<u32>,
    /// First contact; written once by the access controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_date: Option<DateTime<Utc>>,
    pub trial_started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rental status. Only `Active -> Expired` is a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Expired,
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RentalStatus::Active => f.write_str("active"),
            RentalStatus::Expired => f.write_str("expired"),
        }
    }
}

/// Time-bounded entitlement granting a group access to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rental {
    pub group_id: String,
    pub plan: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: RentalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Rental {
    /// Fresh active rental covering `[start, end)`
    pub fn new(
        group_id: impl Into<String>,
        plan: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            plan: plan.into(),
            start_date: start,
            end_date: end,
            status: RentalStatus::Active,
            created_at: start,
            updated_at: None,
            deactivated_at: None,
        }
    }

    /// Active status and an end date still in the future
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == RentalStatus::Active && now < self.end_date
    }

    /// Time left until `end_date`, zero once passed
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.end_date - now).max(Duration::zero())
    }
}

/// Anti-spam toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AntiSpamSettings {
    pub anti_link: bool,
    pub anti_link2: bool,
    pub anti_call: bool,
    pub anti_private: bool,
    pub anti_delete: bool,
}

/// Moderation toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModerationSettings {
    pub welcome: bool,
    pub restrict: bool,
    pub auto_read: bool,
    pub auto_admin: bool,
}

/// Per-group settings. `Default` is the baseline used for groups without a
/// stored record: every toggle off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupSettings {
    pub anti_spam: AntiSpamSettings,
    pub moderation: ModerationSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-member activity inside one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub group_id: String,
    pub user_id: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Activity {
    /// Composite store key `<group>:<user>`
    pub fn key(group_id: &str, user_id: &str) -> String {
        format!("{group_id}:{user_id}")
    }

    /// Untouched counter for a member seen for the first time
    pub fn empty(group_id: &str, user_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            message_count: 0,
            first_seen: None,
            last_seen: None,
        }
    }
}
