// =============================================================================
// Sofiya - Bot Module
// =============================================================================
//
// Author: Sofiya Bot Team
// Date: 2026-10-03
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Bot service for the Sofiya moderation core. This module provides:
//   - Inbound message and membership handling behind the access gate
//   - Rate-limited outbound sends through the chat transport
//   - The scheduled maintenance jobs
//   - Configuration loading and logging setup
//
// Architecture:
//   • One logical worker consumes `BotEvent`s in arrival order
//   • Scheduler jobs run concurrently, each in its own task
//   • All state lives in the shared `Database`
//
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sofiya_core::{InboundMessage, ParticipantAction, ParticipantUpdate, Result, Transport};
use sofiya_rental::{AccessController, AccessDecision, RentalManager};
use sofiya_store::Database;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

pub mod config;
pub mod logging;
pub mod notices;
pub mod rate_limiter;
pub mod scheduler;

pub use config::{BotConfig, IdentityConfig};
pub use rate_limiter::RateLimiter;
pub use scheduler::{Cadence, Job, JobHandler, Scheduler};

/// Commands that show the rental plans to a group without access
const RENTAL_COMMANDS: [&str; 3] = ["rent", "аренда", "чекаренды"];

/// Inbound event from the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BotEvent {
    Message(InboundMessage),
    Participants(ParticipantUpdate),
}

/// Outcome of handling one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing to act on
    Ignored,
    /// Private chat; not gated
    Direct,
    /// Rental gating is switched off
    Ungated,
    /// Group may use the service
    Allowed(AccessDecision),
    /// Group has neither a rental nor a trial
    NoAccess,
}

/// Bot service
pub struct Service {
    /// Bot configuration
    config: BotConfig,
    /// Record store
    db: Arc<Database>,
    rentals: RentalManager,
    access: AccessController,
    limiter: RateLimiter,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.config.bot.name)
            .field("data_dir", &self.db.data_dir())
            .finish()
    }
}

impl Service {
    /// Wire the service over an opened database and a transport
    pub fn new(config: BotConfig, db: Arc<Database>, transport: Arc<dyn Transport>) -> Self {
        let rentals = RentalManager::new(db.clone());
        let access = AccessController::new(db.clone(), rentals.clone(), config.rental.trial_hours);
        let limiter = RateLimiter::new(config.limits.clone(), db.clock().clone());

        Self {
            config,
            db,
            rentals,
            access,
            limiter,
            transport,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn rentals(&self) -> &RentalManager {
        &self.rentals
    }

    pub fn access(&self) -> &AccessController {
        &self.access
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Process events until the channel closes, then shut down
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BotEvent>) -> Result<()> {
        info!("🚀 {} v{} is running", self.config.bot.name, self.config.bot.version);

        while let Some(event) = events.recv().await {
            match event {
                BotEvent::Message(message) => {
                    self.handle_message(message).await;
                }
                BotEvent::Participants(update) => self.handle_participants(update).await,
            }
        }

        info!("📭 Event stream closed");
        self.shutdown().await
    }

    /// Gate one inbound message
    #[instrument(skip(self, message), fields(chat = %message.chat_id))]
    pub async fn handle_message(&self, message: InboundMessage) -> Verdict {
        if message.text.trim().is_empty() {
            return Verdict::Ignored;
        }
        if !message.is_group {
            return Verdict::Direct;
        }

        if let Err(e) = self
            .db
            .record_activity(&message.chat_id, &message.sender_id)
            .await
        {
            warn!("⚠️ Failed to record activity: {}", e);
        }

        if !self.config.rental.enabled {
            return Verdict::Ungated;
        }

        let decision = self.access.decide(&message.chat_id).await;
        if decision.is_granted() {
            return Verdict::Allowed(decision);
        }

        if self.is_rental_command(&message.text) {
            let notice = notices::rental_plans_notice(&self.config, &message.chat_id);
            self.send(&message.chat_id, &notice, &[]).await;
            info!("🚫 Rental info sent to group without access: {}", message.chat_id);
        }
        Verdict::NoAccess
    }

    fn is_rental_command(&self, text: &str) -> bool {
        text.split_whitespace()
            .next()
            .and_then(|word| word.strip_prefix(self.config.bot.prefix.as_str()))
            .is_some_and(|command| {
                let command = command.to_lowercase();
                RENTAL_COMMANDS.contains(&command.as_str())
            })
    }

    /// Record joins and greet new members of groups with access
    #[instrument(skip(self, update), fields(group = %update.group_id, action = ?update.action))]
    pub async fn handle_participants(&self, update: ParticipantUpdate) {
        if update.action != ParticipantAction::Add {
            debug!("Participants {:?}: {:?}", update.action, update.participants);
            return;
        }
        if self.config.rental.enabled && !self.access.has_access(&update.group_id).await {
            return;
        }

        for participant in &update.participants {
            if let Err(e) = self.db.record_join(&update.group_id, participant).await {
                warn!("⚠️ Failed to record join of {}: {}", participant, e);
            }
        }

        if !self.db.group_settings(&update.group_id).await.moderation.welcome {
            return;
        }
        let group_name = self
            .db
            .group(&update.group_id)
            .await
            .and_then(|group| group.name)
            .unwrap_or_else(|| update.group_id.clone());

        for participant in &update.participants {
            let text = notices::welcome_notice(&self.config.bot.name, &group_name, participant);
            self.send(&update.group_id, &text, std::slice::from_ref(participant))
                .await;
        }
    }

    /// Store fresh metadata for a group with an active rental or the owner
    /// chat; `false` otherwise
    ///
    /// Refreshing never starts a trial.
    #[instrument(skip(self))]
    pub async fn refresh_group(&self, group_id: &str) -> Result<bool> {
        let granted =
            self.config.is_owner(group_id) || self.rentals.is_active(group_id).await;
        if !granted {
            return Ok(false);
        }

        let metadata = self.transport.group_metadata(group_id).await?;
        let now = self.db.clock().now();
        self.db
            .set_group(
                group_id,
                json!({
                    "name": metadata.subject,
                    "participants": metadata.participants.len(),
                    "lastUpdate": now.to_rfc3339(),
                }),
            )
            .await?;
        Ok(true)
    }

    /// Refresh every group the transport reports; returns how many have
    /// access
    #[instrument(skip(self))]
    pub async fn load_active_groups(&self) -> Result<usize> {
        let groups = self.transport.participating_groups().await?;

        let mut active = 0;
        for group_id in &groups {
            match self.refresh_group(group_id).await {
                Ok(true) => active += 1,
                Ok(false) => {}
                Err(e) => warn!("⚠️ Failed to refresh group {}: {}", group_id, e),
            }
        }

        info!("✅ Loaded {} active groups of {}", active, groups.len());
        if active > self.config.bot.max_groups {
            warn!(
                "⚠️ Active groups ({}) exceed limit ({})",
                active, self.config.bot.max_groups
            );
        }
        Ok(active)
    }

    /// Rate-limited send; `false` when limited or when the transport fails
    pub async fn send(&self, chat_id: &str, text: &str, mentions: &[String]) -> bool {
        if !self.limiter.allow(chat_id) {
            warn!("🚦 Rate limit exceeded for {}", chat_id);
            return false;
        }

        match self.transport.send(chat_id, text, mentions).await {
            Ok(()) => true,
            Err(e) => {
                warn!("❌ Send to {} failed: {}", chat_id, e);
                false
            }
        }
    }

    /// Message the configured owner; `false` when no owner is set
    pub async fn notify_owner(&self, text: &str) -> bool {
        match self.config.bot.owner_number.as_deref() {
            Some(owner) => self.send(owner, text, &[]).await,
            None => {
                debug!("No owner configured, notice dropped");
                false
            }
        }
    }

    /// Persist everything and take a final snapshot
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        info!("🛑 Shutting down");
        self.db.flush_all().await?;
        self.db.snapshot().await?;
        Ok(())
    }

    /// Expire overdue rentals, then warn groups whose rental ends soon
    async fn sweep_rentals(&self) -> Result<()> {
        let expired = self.rentals.sweep_expired().await?;
        if expired > 0 {
            self.notify_owner(&format!("⌛ {} rentals expired", expired))
                .await;
        }

        let now = self.db.clock().now();
        let owner = self.config.bot.owner_number.as_deref();
        let expiring = self
            .rentals
            .expiring_within(self.config.rental.expiry_warning_hours)
            .await;
        for rental in &expiring {
            let notice = notices::expiry_warning_notice(rental, now, owner);
            self.send(&rental.group_id, &notice, &[]).await;
        }
        Ok(())
    }

    /// Remove log files and backups past retention
    async fn trim_retention(&self) -> Result<()> {
        let now = self.db.clock().now();
        let logging = &self.config.logging;
        logging::prune_old_logs(&logging.directory, logging.retention_days, now).await?;
        self.db.prune_backups().await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for Service {
    async fn run_job(&self, job: Job) -> Result<()> {
        match job {
            Job::RentalSweep => self.sweep_rentals().await,
            Job::Backup => {
                self.db.flush_all().await?;
                let report = self.db.snapshot().await?;
                debug!("Backup written to {}", report.path.display());
                Ok(())
            }
            Job::RetentionTrim => self.trim_retention().await,
            Job::RateLimitReset => {
                self.limiter.clear();
                Ok(())
            }
        }
    }
}
