//! Moderator review sessions.
//!
//! A session walks one moderator through a guild's queue snapshot, head
//! first. Each decision is durable the moment it is taken: approved and
//! denied entries are popped immediately, so a timeout or cancellation
//! leaves the queue exactly as consumed so far and the next session resumes
//! from the new head.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RelayLimits;
use crate::error::{PlatformError, RelayError, SessionError, StoreError};
use crate::platform::{ChatClient, ReviewPrompt};
use crate::render::{color_for, pick_signoff};
use crate::store::Storage;
use crate::types::{ChannelId, Decision, GuildId, QueueEntry, RelayedMessage, UserId};

/// How a review session ended. All variants carry the durable progress made
/// before the session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The snapshot was exhausted.
    Finished {
        approved: usize,
        denied: usize,
        skipped: usize,
    },
    /// The moderator went quiet past the inactivity timeout.
    TimedOut {
        approved: usize,
        denied: usize,
        skipped: usize,
    },
    /// The moderator cancelled explicitly.
    Cancelled {
        approved: usize,
        denied: usize,
        skipped: usize,
    },
}

impl SessionOutcome {
    /// Entries skipped because their captured output channel was gone or
    /// delivery failed past the retry.
    pub fn skipped(&self) -> usize {
        match self {
            Self::Finished { skipped, .. }
            | Self::TimedOut { skipped, .. }
            | Self::Cancelled { skipped, .. } => *skipped,
        }
    }
}

/// Guards the one-active-session-per-guild rule.
///
/// Two sessions advancing independent snapshots against the same durable
/// queue would corrupt ordering, so the second caller gets
/// [`SessionError::Busy`] instead.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashSet<GuildId>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the guild's session slot. The returned guard releases it on
    /// drop, including on panic or early return.
    pub fn begin(self: &Arc<Self>, guild: GuildId) -> Result<SessionGuard, SessionError> {
        let mut active = self.active.lock().expect("session registry poisoned");
        if !active.insert(guild) {
            return Err(SessionError::Busy);
        }
        Ok(SessionGuard {
            guild,
            registry: Arc::clone(self),
        })
    }

    pub fn is_active(&self, guild: GuildId) -> bool {
        self.active
            .lock()
            .expect("session registry poisoned")
            .contains(&guild)
    }
}

/// RAII claim on a guild's review slot.
#[derive(Debug)]
pub struct SessionGuard {
    guild: GuildId,
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .expect("session registry poisoned")
            .remove(&self.guild);
    }
}

/// One moderator's traversal of a guild's queue.
pub struct ReviewSession {
    id: Uuid,
    guild: GuildId,
    moderator: UserId,
    storage: Arc<dyn Storage>,
    platform: Arc<dyn ChatClient>,
    timeout: Duration,
}

impl ReviewSession {
    pub fn new(
        guild: GuildId,
        moderator: UserId,
        storage: Arc<dyn Storage>,
        platform: Arc<dyn ChatClient>,
        limits: &RelayLimits,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild,
            moderator,
            storage,
            platform,
            timeout: limits.review_timeout,
        }
    }

    /// Drive the session to completion, timeout, or cancellation.
    ///
    /// The caller holds the guild's serialization lock and the
    /// [`SessionRegistry`] guard for the whole run.
    pub async fn run(&self) -> Result<SessionOutcome, RelayError> {
        let config = self.storage.get_config(self.guild).await?;
        if config.output_channel.is_none() {
            return Err(SessionError::NoOutputConfigured.into());
        }

        let snapshot = self.storage.snapshot(self.guild).await?;
        info!(
            session = %self.id,
            guild = %self.guild,
            moderator = %self.moderator,
            pending = snapshot.len(),
            "Review session started"
        );

        let mut approved = 0usize;
        let mut denied = 0usize;
        let mut skipped = 0usize;
        // Display sequence tracks the durable counter; only successful
        // dispatches advance it.
        let mut sequence = config.counter;

        for entry in &snapshot {
            let head = entry
                .id
                .ok_or_else(|| StoreError::Corrupt("snapshot entry without id".into()))?;
            let remaining = snapshot.len() - approved - denied - skipped;

            // Dead output target: the entry can never be delivered. Drop it
            // without consuming a decision.
            if !self.platform.resolve_channel(entry.output_channel).await {
                warn!(
                    session = %self.id,
                    guild = %self.guild,
                    entry = head,
                    channel = %entry.output_channel,
                    "Output channel gone, skipping entry"
                );
                self.storage.pop_front(self.guild, head).await?;
                skipped += 1;
                continue;
            }

            let prompt = ReviewPrompt {
                remaining,
                content: entry.display_content(),
                output_channel: entry.output_channel,
            };

            let decision = match tokio::time::timeout(
                self.timeout,
                self.platform
                    .request_decision(self.guild, self.moderator, &prompt, self.timeout),
            )
            .await
            {
                Err(_elapsed) => None,
                Ok(signal) => signal?,
            };

            match decision {
                None => {
                    info!(session = %self.id, guild = %self.guild, "Review session timed out");
                    return Ok(SessionOutcome::TimedOut {
                        approved,
                        denied,
                        skipped,
                    });
                }
                Some(Decision::Cancel) => {
                    info!(session = %self.id, guild = %self.guild, "Review session cancelled");
                    return Ok(SessionOutcome::Cancelled {
                        approved,
                        denied,
                        skipped,
                    });
                }
                Some(Decision::Deny) => {
                    self.storage.pop_front(self.guild, head).await?;
                    denied += 1;
                }
                Some(Decision::Approve) => {
                    self.storage.pop_front(self.guild, head).await?;

                    let message = RelayedMessage {
                        body: entry.display_content(),
                        signoff: pick_signoff(&config),
                        sequence,
                        color: color_for(sequence),
                    };

                    match self.dispatch(entry, &message).await {
                        Ok(()) => {
                            let previous = self.storage.next_sequence(self.guild).await?;
                            sequence = previous + 1;
                            approved += 1;
                        }
                        Err(e) => {
                            // Popped but undeliverable: surface it as skipped
                            // rather than dropping it silently.
                            warn!(
                                session = %self.id,
                                guild = %self.guild,
                                entry = head,
                                error = %e,
                                "Dispatch failed after retry, entry skipped"
                            );
                            skipped += 1;
                        }
                    }
                }
            }
        }

        info!(
            session = %self.id,
            guild = %self.guild,
            approved,
            denied,
            skipped,
            "Review session finished"
        );
        Ok(SessionOutcome::Finished {
            approved,
            denied,
            skipped,
        })
    }

    /// Deliver an approved entry, retrying once on a transient failure.
    async fn dispatch(
        &self,
        entry: &QueueEntry,
        message: &RelayedMessage,
    ) -> Result<(), PlatformError> {
        let target: ChannelId = entry.output_channel;
        match self.platform.send_message(target, message).await {
            Ok(_) => Ok(()),
            Err(PlatformError::Transient(reason)) => {
                warn!(
                    session = %self.id,
                    channel = %target,
                    reason = %reason,
                    "Transient delivery failure, retrying once"
                );
                self.platform.send_message(target, message).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}
