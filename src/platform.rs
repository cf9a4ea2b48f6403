//! Chat-platform collaborator contracts.
//!
//! The relay core never talks to the wire. A platform adapter (gateway
//! connection, embed rendering, command parsing) implements these traits and
//! feeds events into [`crate::relay::Relay`].

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::types::{ChannelId, Decision, GuildId, MessageRef, RelayedMessage, RoleId, UserId};

/// What the adapter shows the moderator for the entry under review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPrompt {
    /// Entries left in this session, including the one being presented.
    pub remaining: usize,
    /// Submission text with newlines restored.
    pub content: String,
    /// Where the entry will land if approved.
    pub output_channel: ChannelId,
}

/// Outbound half of the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Deliver an approved message to its captured output channel.
    ///
    /// The adapter owns rendering (embeds and so on); the core supplies the
    /// restored body, signoff, sequence number, and derived color in
    /// [`RelayedMessage`].
    async fn send_message(
        &self,
        target: ChannelId,
        message: &RelayedMessage,
    ) -> Result<MessageRef, PlatformError>;

    /// Whether a channel still exists and is reachable.
    async fn resolve_channel(&self, channel: ChannelId) -> bool;

    /// Whether a role still exists in the guild.
    async fn resolve_role(&self, guild: GuildId, role: RoleId) -> bool;

    /// Whether the user currently holds the role in the guild.
    async fn member_has_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<bool, PlatformError>;

    /// The guild's ban list, or `None` when the bot lacks the permission to
    /// read it (the caller falls back to the muted-role check).
    async fn get_bans(&self, guild: GuildId) -> Result<Option<HashSet<UserId>>, PlatformError>;

    /// Present an entry to the moderator and block until they signal a
    /// decision or `timeout` elapses (`Ok(None)`).
    async fn request_decision(
        &self,
        guild: GuildId,
        moderator: UserId,
        prompt: &ReviewPrompt,
        timeout: Duration,
    ) -> Result<Option<Decision>, PlatformError>;
}

/// Best-effort notification sink for queue-depth changes and configuration
/// warnings. Failures are logged by callers, never propagated — a broken
/// notify channel must not block the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The guild's queue depth changed after a successful enqueue.
    async fn queue_depth_changed(
        &self,
        guild: GuildId,
        notify_channel: ChannelId,
        depth: usize,
    ) -> Result<(), PlatformError>;

    /// Configuration drift detected (e.g. the muted role no longer resolves).
    async fn config_warning(
        &self,
        guild: GuildId,
        notify_channel: ChannelId,
        warning: &str,
    ) -> Result<(), PlatformError>;
}
