//! Backend-agnostic storage trait.

use async_trait::async_trait;

use crate::config::GuildConfig;
use crate::error::StoreError;
use crate::types::{GuildId, KnownGuilds, QueueEntry};

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<GuildId>,
    pub removed: Vec<GuildId>,
}

/// Durable per-guild state: one config record and one FIFO queue per guild.
///
/// All mutations are atomic per guild record; callers serialize concurrent
/// writers to the same guild (the relay holds a per-guild lock).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create a guild's config record with defaults. Idempotent.
    async fn create_guild(&self, guild: GuildId) -> Result<(), StoreError>;

    /// Remove a guild's config record and its entire queue.
    async fn remove_guild(&self, guild: GuildId) -> Result<(), StoreError>;

    /// All guilds with a persisted config record.
    async fn known_guilds(&self) -> Result<Vec<GuildId>, StoreError>;

    /// Bring persisted state in line with the set of guilds the process
    /// actually belongs to: create missing records, drop stale ones.
    async fn reconcile(&self, known: &KnownGuilds) -> Result<ReconcileReport, StoreError>;

    /// Fetch a guild's config. `StoreError::NotFound` if never created.
    async fn get_config(&self, guild: GuildId) -> Result<GuildConfig, StoreError>;

    /// Whole-record config write. `StoreError::NotFound` if never created.
    async fn put_config(&self, guild: GuildId, config: &GuildConfig) -> Result<(), StoreError>;

    /// Atomically advance the guild's message counter, returning the
    /// pre-increment value.
    async fn next_sequence(&self, guild: GuildId) -> Result<u64, StoreError>;

    /// Moderator reset of the message counter back to 1.
    async fn reset_counter(&self, guild: GuildId) -> Result<(), StoreError>;

    /// Append an entry to the guild's queue; returns the new depth.
    async fn enqueue(&self, guild: GuildId, entry: &QueueEntry) -> Result<usize, StoreError>;

    /// Ordered read-only copy of the guild's queue, ids populated.
    async fn snapshot(&self, guild: GuildId) -> Result<Vec<QueueEntry>, StoreError>;

    /// Remove the queue head, but only if it is still the entry the caller
    /// expects. `StoreError::Conflict` if the head moved underneath us.
    async fn pop_front(&self, guild: GuildId, expected_head: i64) -> Result<(), StoreError>;

    /// Current queue depth for the guild.
    async fn queue_depth(&self, guild: GuildId) -> Result<usize, StoreError>;
}
