//! The relay orchestrator — event surface and per-guild serialization.
//!
//! A platform adapter calls into [`Relay`] for every event it receives:
//! submission requests, review invocations, config commands, guild
//! join/leave, and startup. All state touching one guild funnels through
//! that guild's mutex; different guilds proceed fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{GuildConfig, RelayLimits};
use crate::cooldown::Cooldowns;
use crate::error::{RelayError, Result};
use crate::platform::{ChatClient, Notifier};
use crate::review::{ReviewSession, SessionOutcome, SessionRegistry};
use crate::store::{ReconcileReport, Storage};
use crate::types::{ChannelId, GuildId, KnownGuilds, RoleId, SubmissionEvent, UserId};
use crate::validate;

/// Top-level handle wiring the pipeline together.
pub struct Relay {
    storage: Arc<dyn Storage>,
    platform: Arc<dyn ChatClient>,
    notifier: Arc<dyn Notifier>,
    cooldowns: Arc<Cooldowns>,
    sessions: Arc<SessionRegistry>,
    limits: RelayLimits,
    guild_locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

impl Relay {
    pub fn new(
        storage: Arc<dyn Storage>,
        platform: Arc<dyn ChatClient>,
        notifier: Arc<dyn Notifier>,
        limits: RelayLimits,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            platform,
            notifier,
            cooldowns: Cooldowns::new(),
            sessions: SessionRegistry::new(),
            limits,
            guild_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The serialization point for one guild's config, queue, and session.
    async fn guild_lock(&self, guild: GuildId) -> Arc<Mutex<()>> {
        let mut locks = self.guild_locks.lock().await;
        Arc::clone(locks.entry(guild).or_default())
    }

    /// An anonymous submission arrived from the platform adapter.
    ///
    /// On success the entry is durably queued, the submitter's cooldown has
    /// started, and the notify channel (if configured) heard about the new
    /// depth. A `RelayError::Rejected` carries text for the submitter only.
    pub async fn handle_submission(&self, event: SubmissionEvent) -> Result<()> {
        let lock = self.guild_lock(event.guild).await;
        let _guard = lock.lock().await;

        let config = self.storage.get_config(event.guild).await?;
        let entry = validate::validate(
            &event,
            &config,
            &self.limits,
            &self.cooldowns,
            self.platform.as_ref(),
            self.notifier.as_ref(),
        )
        .await?;

        let depth = self.storage.enqueue(event.guild, &entry).await?;
        self.cooldowns.start(event.submitter, self.limits.cooldown).await;
        info!(guild = %event.guild, depth, "Submission accepted");

        if let Some(notify) = config.notify_channel {
            if let Err(e) = self
                .notifier
                .queue_depth_changed(event.guild, notify, depth)
                .await
            {
                warn!(guild = %event.guild, error = %e, "Queue-depth notification failed");
            }
        }
        Ok(())
    }

    /// A moderator asked to review the guild's queue.
    ///
    /// At most one session per guild runs at a time; a second invocation
    /// gets `SessionError::Busy`. The guild lock is held for the whole
    /// session, so submissions and config changes wait for it to end.
    pub async fn start_review(&self, guild: GuildId, moderator: UserId) -> Result<SessionOutcome> {
        let _slot = self.sessions.begin(guild)?;
        let lock = self.guild_lock(guild).await;
        let _guard = lock.lock().await;

        let session = ReviewSession::new(
            guild,
            moderator,
            Arc::clone(&self.storage),
            Arc::clone(&self.platform),
            &self.limits,
        );
        session.run().await
    }

    /// Read-modify-write of one guild's config under its lock.
    async fn update_config<F>(&self, guild: GuildId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut GuildConfig),
    {
        let lock = self.guild_lock(guild).await;
        let _guard = lock.lock().await;

        let mut config = self.storage.get_config(guild).await?;
        apply(&mut config);
        self.storage.put_config(guild, &config).await?;
        Ok(())
    }

    /// Set or clear the destination for approved messages.
    pub async fn set_output_channel(
        &self,
        guild: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        self.update_config(guild, |c| c.output_channel = channel).await
    }

    /// Set or clear the queue-depth notification channel.
    pub async fn set_notify_channel(
        &self,
        guild: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        self.update_config(guild, |c| c.notify_channel = channel).await
    }

    /// Set or clear the muted role.
    pub async fn set_muted_role(&self, guild: GuildId, role: Option<RoleId>) -> Result<()> {
        self.update_config(guild, |c| c.muted_role = role).await
    }

    /// Set or clear the signoff appended to approved messages.
    pub async fn set_signoff(&self, guild: GuildId, signoff: Option<String>) -> Result<()> {
        if let Some(ref s) = signoff {
            if s.chars().count() > self.limits.max_signoff_len {
                return Err(RelayError::SignoffTooLong {
                    max: self.limits.max_signoff_len,
                });
            }
        }
        self.update_config(guild, |c| c.signoff = signoff).await
    }

    /// Moderator reset of the guild's message counter.
    pub async fn reset_counter(&self, guild: GuildId) -> Result<()> {
        let lock = self.guild_lock(guild).await;
        let _guard = lock.lock().await;
        self.storage.reset_counter(guild).await?;
        Ok(())
    }

    /// Current pending-queue depth for the guild.
    pub async fn queue_depth(&self, guild: GuildId) -> Result<usize> {
        Ok(self.storage.queue_depth(guild).await?)
    }

    /// The bot joined a guild: create its config and queue with defaults.
    pub async fn on_guild_joined(&self, guild: GuildId) -> Result<()> {
        self.storage.create_guild(guild).await?;
        info!(guild = %guild, "Guild joined");
        Ok(())
    }

    /// The bot left a guild: drop its config and queue.
    pub async fn on_guild_left(&self, guild: GuildId) -> Result<()> {
        let lock = self.guild_lock(guild).await;
        let _guard = lock.lock().await;
        self.storage.remove_guild(guild).await?;
        drop(_guard);

        self.guild_locks.lock().await.remove(&guild);
        info!(guild = %guild, "Guild left");
        Ok(())
    }

    /// Process start: align persisted state with the guilds we belong to.
    pub async fn on_startup(&self, known: &KnownGuilds) -> Result<ReconcileReport> {
        let report = self.storage.reconcile(known).await?;
        info!(
            created = report.created.len(),
            removed = report.removed.len(),
            "Startup reconcile complete"
        );
        Ok(report)
    }
}
