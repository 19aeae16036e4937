//! Sofiya Core Library
//!
//! Author: Sofiya Bot Team
//! Version: 0.1.0
//! Date: 2026-09-28
//!
//! Fundamental types shared by every Sofiya crate: the error type, the
//! injectable clock, persisted entity records, configuration sections and
//! the boundary types of the chat transport.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use sofiya_core::{Clock, ManualClock, Rental, RentalStatus};
//!
//! let clock = Arc::new(ManualClock::default());
//! let start = clock.now();
//! let rental = Rental::new("group@g.us", "basic", start, start + chrono::Duration::hours(72));
//! assert_eq!(rental.status, RentalStatus::Active);
//! assert!(rental.is_active_at(clock.now()));
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    LoggingConfig, RateLimitConfig, RentalConfig, RentalPlan, StorageConfig, MAX_CONFIG_HOURS,
};
pub use error::{Result, SofiyaError};
pub use traits::{
    GroupMetadata, InboundMessage, ParticipantAction, ParticipantUpdate, Transport,
};
pub use types::{
    Activity, AntiSpamSettings, EntityType, GroupRecord, GroupSettings, ModerationSettings,
    Rental, RentalStatus,
};
