//! Configuration module for Sofiya
//!
//! Configuration sections shared by the store, rental and bot crates. The
//! bot crate composes them into its top-level configuration and loads it
//! from file and environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Result, SofiyaError};

/// Upper bound for every configured hour count: one hundred years
pub const MAX_CONFIG_HOURS: i64 = 24 * 365 * 100;

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per entity type
    pub data_dir: PathBuf,

    /// Backup root; defaults to `<data_dir>/backups`
    pub backup_dir: Option<PathBuf>,

    /// Backups older than this many days are removed
    pub backup_retention_days: u32,

    /// Activity counters are persisted every N recorded messages
    pub activity_flush_every: u64,
}

/// A purchasable rental plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalPlan {
    /// Plan identifier shown to users
    pub name: String,

    /// Price in `RentalConfig::currency`
    pub price: u32,

    /// Rental length in hours
    pub duration_hours: i64,
}

/// Rental and trial configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalConfig {
    /// Whether rental gating is enforced
    pub enabled: bool,

    /// Trial window granted on first contact, in hours
    pub trial_hours: i64,

    /// Rentals ending within this many hours get a warning
    pub expiry_warning_hours: i64,

    /// Currency label for plan prices
    pub currency: String,

    /// Available plans
    pub plans: Vec<RentalPlan>,
}

/// Outbound message rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,

    /// Messages allowed per chat in one window
    pub messages_per_window: u32,

    /// Window length in milliseconds
    pub window_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,

    /// Directory for rolling log files
    pub directory: PathBuf,

    /// Whether to also write logs to files
    pub file_logging: bool,

    /// Log files older than this many days are removed by the weekly trim
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("database"),
            backup_dir: None,
            backup_retention_days: 30,
            activity_flush_every: 10,
        }
    }
}

impl StorageConfig {
    /// Effective backup root
    pub fn backup_root(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("backups"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(SofiyaError::config("Data directory cannot be empty"));
        }
        if self.backup_retention_days == 0 {
            return Err(SofiyaError::config("Backup retention must be at least one day"));
        }
        if self.activity_flush_every == 0 {
            return Err(SofiyaError::config("Activity flush interval cannot be 0"));
        }
        Ok(())
    }
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trial_hours: 72,
            expiry_warning_hours: 24,
            currency: "RUB".to_string(),
            plans: vec![
                RentalPlan {
                    name: "week".to_string(),
                    price: 150,
                    duration_hours: 24 * 7,
                },
                RentalPlan {
                    name: "month".to_string(),
                    price: 500,
                    duration_hours: 24 * 30,
                },
            ],
        }
    }
}

impl RentalConfig {
    /// Look up a plan by name, case-insensitively
    pub fn plan(&self, name: &str) -> Option<&RentalPlan> {
        self.plans
            .iter()
            .find(|plan| plan.name.eq_ignore_ascii_case(name))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_CONFIG_HOURS).contains(&self.trial_hours) {
            return Err(SofiyaError::config(format!(
                "Trial window must be between 0 and {} hours",
                MAX_CONFIG_HOURS
            )));
        }
        if !(1..=MAX_CONFIG_HOURS).contains(&self.expiry_warning_hours) {
            return Err(SofiyaError::config(format!(
                "Expiry warning window must be between 1 and {} hours",
                MAX_CONFIG_HOURS
            )));
        }
        if let Some(plan) = self
            .plans
            .iter()
            .find(|plan| !(1..=MAX_CONFIG_HOURS).contains(&plan.duration_hours))
        {
            return Err(SofiyaError::config(format!(
                "Plan '{}' must last between 1 and {} hours",
                plan.name, MAX_CONFIG_HOURS
            )));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            messages_per_window: 20,
            window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.messages_per_window == 0 {
            return Err(SofiyaError::config("Messages per window cannot be 0"));
        }
        if self.window_ms == 0 {
            return Err(SofiyaError::config("Rate limit window cannot be 0"));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            file_logging: true,
            retention_days: 7,
        }
    }
}

impl LoggingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(SofiyaError::config("Log level cannot be empty"));
        }
        if self.retention_days == 0 {
            return Err(SofiyaError::config("Log retention must be at least one day"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StorageConfig::default().validate().is_ok());
        assert!(RentalConfig::default().validate().is_ok());
        assert!(RateLimitConfig::default().validate().is_ok());
        assert!(LoggingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_backup_root_defaults_under_data_dir() {
        let config = StorageConfig::default();
        assert_eq!(config.backup_root(), PathBuf::from("database").join("backups"));

        let config = StorageConfig {
            backup_dir: Some(PathBuf::from("/srv/backups")),
            ..StorageConfig::default()
        };
        assert_eq!(config.backup_root(), PathBuf::from("/srv/backups"));
    }

    #[test]
    fn test_plan_lookup() {
        let config = RentalConfig::default();
        assert_eq!(config.plan("WEEK").map(|p| p.duration_hours), Some(168));
        assert!(config.plan("lifetime").is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut rental = RentalConfig::default();
        rental.plans[0].duration_hours = 0;
        assert!(rental.validate().is_err());

        let limits = RateLimitConfig {
            window_ms: 0,
            ..RateLimitConfig::default()
        };
        assert!(limits.validate().is_err());

        let storage = StorageConfig {
            backup_retention_days: 0,
            ..StorageConfig::default()
        };
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_hour_counts_are_bounded() {
        let rental = RentalConfig {
            trial_hours: MAX_CONFIG_HOURS,
            ..RentalConfig::default()
        };
        assert!(rental.validate().is_ok());

        let rental = RentalConfig {
            trial_hours: MAX_CONFIG_HOURS + 1,
            ..RentalConfig::default()
        };
        assert!(rental.validate().is_err());

        let rental = RentalConfig {
            expiry_warning_hours: i64::MAX,
            ..RentalConfig::default()
        };
        assert!(rental.validate().is_err());

        let mut rental = RentalConfig::default();
        rental.plans[1].duration_hours = 10_000_000_000;
        assert!(rental.validate().is_err());
    }

    #[test]
    fn test_partial_section_deserializes_with_defaults() {
        let limits: RateLimitConfig =
            serde_json::from_str(r#"{ "messages_per_window": 3 }"#).unwrap();
        assert_eq!(limits.messages_per_window, 3);
        assert_eq!(limits.window_ms, 60_000);
        assert!(limits.enabled);
    }
}
