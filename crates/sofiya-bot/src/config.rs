// =============================================================================
// Sofiya - Bot Configuration Module
// =============================================================================
//
// Author: Sofiya Bot Team
// Date: 2026-10-02
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Configuration management for the Sofiya bot service
//   - Identity and command prefix
//   - Storage and backup retention
//   - Rental plans and trial window
//   - Outbound rate limits
//   - Logging
//
//   Sources are layered with figment: built-in defaults, then an optional
//   TOML file, then `SOFIYA_` environment variables (`__` separates nested
//   keys, e.g. `SOFIYA_STORAGE__DATA_DIR`).
//
// =============================================================================

use std::{
    fs,
    path::{Path, PathBuf},
};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use sofiya_core::{
    LoggingConfig, RateLimitConfig, RentalConfig, Result, SofiyaError, StorageConfig,
};
use tracing::{debug, info};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SOFIYA_";

/// Bot configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot identity settings
    pub bot: IdentityConfig,
    /// Record store settings
    pub storage: StorageConfig,
    /// Rental and trial settings
    pub rental: RentalConfig,
    /// Outbound rate limits
    pub limits: RateLimitConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Bot identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Display name
    pub name: String,
    /// Command prefix (default: ".")
    pub prefix: String,
    /// Chat id of the operator; receives service notices
    pub owner_number: Option<String>,
    /// Version string shown in notices
    pub version: String,
    /// Granted groups above this count produce a warning
    pub max_groups: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "Sofiya".to_string(),
            prefix: ".".to_string(),
            owner_number: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_groups: 50,
        }
    }
}

impl BotConfig {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment
    ///
    /// An explicit `path` must exist. Without one, the per-user config file
    /// is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(BotConfig::default()));

        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(SofiyaError::config(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                info!("📁 Using configuration file: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(default_path) = default_config_path().filter(|p| p.is_file()) {
                    info!("📁 Using configuration file: {}", default_path.display());
                    figment = figment.merge(Toml::file(default_path));
                } else {
                    debug!("No configuration file, using defaults and environment");
                }
            }
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Parse a TOML document layered over the defaults, without the
    /// environment
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Self::extract(
            Figment::from(Serialized::defaults(BotConfig::default())).merge(Toml::string(source)),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: BotConfig = figment
            .extract()
            .map_err(|e| SofiyaError::config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        if self.bot.prefix.trim().is_empty() {
            return Err(SofiyaError::config("Command prefix cannot be empty"));
        }
        if self.bot.max_groups == 0 {
            return Err(SofiyaError::config("Maximum group count cannot be 0"));
        }
        self.storage.validate()?;
        self.rental.validate()?;
        self.limits.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Save configuration as TOML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let body = toml::to_string_pretty(self)
            .map_err(|e| SofiyaError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)
            .map_err(|e| SofiyaError::config(format!("Failed to write config file: {}", e)))?;

        info!("✅ Saved configuration to {}", path.as_ref().display());
        Ok(())
    }

    /// Write the defaults to `path` unless a file is already there
    pub fn create_default_config<P: AsRef<Path>>(path: P) -> Result<bool> {
        if path.as_ref().exists() {
            return Ok(false);
        }
        Self::default().save_to_file(path)?;
        Ok(true)
    }

    /// Whether `chat_id` is the configured owner
    pub fn is_owner(&self, chat_id: &str) -> bool {
        self.bot.owner_number.as_deref() == Some(chat_id)
    }
}

/// Per-user configuration file, e.g. `~/.config/sofiya/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sofiya").join("config.toml"))
}
