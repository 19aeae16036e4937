//! Chat transport boundary
//!
//! The transport delivers inbound messages and membership changes and carries
//! outbound sends. Only its boundary lives here; implementations belong to
//! the embedding application.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// One inbound chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: String,
    pub sender_id: String,
    pub is_group: bool,
    pub text: String,
    #[serde(default)]
    pub replied_to: Option<String>,
}

/// Kind of membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Membership change in a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub group_id: String,
    pub participants: Vec<String>,
    pub action: ParticipantAction,
}

/// Group metadata as reported by the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub subject: String,
    pub participants: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Outbound side of the chat network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message, optionally mentioning members
    async fn send(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()>;

    /// Fetch metadata for a group
    async fn group_metadata(&self, group_id: &str) -> Result<GroupMetadata>;

    /// Groups the bot currently participates in
    async fn participating_groups(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
