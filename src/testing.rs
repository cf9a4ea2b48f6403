//! Fake collaborators for testing the relay without a live chat platform.
//!
//! [`FakePlatform`] records every outbound message and plays back scripted
//! moderator decisions; [`FakeNotifier`] records depth alerts and warnings.
//! Both are plain in-memory fakes, deterministic and engine-independent.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platform::{ChatClient, Notifier, ReviewPrompt};
use crate::types::{ChannelId, Decision, GuildId, MessageRef, RelayedMessage, RoleId, UserId};

/// Scripted in-memory chat platform.
#[derive(Default)]
pub struct FakePlatform {
    /// Channels that resolve. Everything else is treated as deleted.
    pub channels: Mutex<HashSet<ChannelId>>,
    /// Roles that resolve, per guild.
    pub roles: Mutex<HashSet<(GuildId, RoleId)>>,
    /// Role membership triples.
    pub member_roles: Mutex<HashSet<(GuildId, UserId, RoleId)>>,
    /// Ban list per the whole fake; `None` models a bot without the
    /// ban-reading permission.
    pub bans: Mutex<Option<HashSet<UserId>>>,
    /// Decisions handed out in order; an empty script means timeout.
    pub decisions: Mutex<VecDeque<Option<Decision>>>,
    /// Prompts shown to moderators, in order.
    pub prompts: Mutex<Vec<ReviewPrompt>>,
    /// Messages delivered, in order.
    pub sent: Mutex<Vec<(ChannelId, RelayedMessage)>>,
    /// Fail this many sends with a transient error before succeeding.
    pub transient_send_failures: Mutex<u32>,
    /// Sleep this long before answering a decision request. Lets tests hold
    /// a review session open under a paused clock.
    pub decision_delay: Mutex<Option<Duration>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&self, channel: ChannelId) {
        self.channels.lock().unwrap().insert(channel);
    }

    pub fn remove_channel(&self, channel: ChannelId) {
        self.channels.lock().unwrap().remove(&channel);
    }

    pub fn add_role(&self, guild: GuildId, role: RoleId) {
        self.roles.lock().unwrap().insert((guild, role));
    }

    pub fn give_role(&self, guild: GuildId, user: UserId, role: RoleId) {
        self.member_roles.lock().unwrap().insert((guild, user, role));
    }

    /// Enable ban-list capability with the given banned users.
    pub fn set_bans(&self, banned: impl IntoIterator<Item = UserId>) {
        *self.bans.lock().unwrap() = Some(banned.into_iter().collect());
    }

    /// Queue up moderator decisions; `None` simulates the inactivity timeout.
    pub fn script_decisions(&self, decisions: impl IntoIterator<Item = Option<Decision>>) {
        self.decisions.lock().unwrap().extend(decisions);
    }

    pub fn fail_next_sends(&self, count: u32) {
        *self.transient_send_failures.lock().unwrap() = count;
    }

    pub fn set_decision_delay(&self, delay: Duration) {
        *self.decision_delay.lock().unwrap() = Some(delay);
    }

    pub fn sent_messages(&self) -> Vec<(ChannelId, RelayedMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn shown_prompts(&self) -> Vec<ReviewPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakePlatform {
    async fn send_message(
        &self,
        target: ChannelId,
        message: &RelayedMessage,
    ) -> Result<MessageRef, PlatformError> {
        {
            let mut failures = self.transient_send_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(PlatformError::Transient("gateway hiccup".into()));
            }
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((target, message.clone()));
        Ok(MessageRef(sent.len() as u64))
    }

    async fn resolve_channel(&self, channel: ChannelId) -> bool {
        self.channels.lock().unwrap().contains(&channel)
    }

    async fn resolve_role(&self, guild: GuildId, role: RoleId) -> bool {
        self.roles.lock().unwrap().contains(&(guild, role))
    }

    async fn member_has_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<bool, PlatformError> {
        Ok(self.member_roles.lock().unwrap().contains(&(guild, user, role)))
    }

    async fn get_bans(&self, _guild: GuildId) -> Result<Option<HashSet<UserId>>, PlatformError> {
        Ok(self.bans.lock().unwrap().clone())
    }

    async fn request_decision(
        &self,
        _guild: GuildId,
        _moderator: UserId,
        prompt: &ReviewPrompt,
        _timeout: Duration,
    ) -> Result<Option<Decision>, PlatformError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let delay = *self.decision_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.decisions.lock().unwrap().pop_front().flatten())
    }
}

/// Recording notification sink.
#[derive(Default)]
pub struct FakeNotifier {
    pub depth_updates: Mutex<Vec<(GuildId, ChannelId, usize)>>,
    pub warnings: Mutex<Vec<(GuildId, ChannelId, String)>>,
    /// When set, every notification fails with a transient error.
    pub fail: Mutex<bool>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    fn check_failing(&self) -> Result<(), PlatformError> {
        if *self.fail.lock().unwrap() {
            return Err(PlatformError::Transient("notify channel unavailable".into()));
        }
        Ok(())
    }

    pub fn depths(&self) -> Vec<usize> {
        self.depth_updates
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, depth)| *depth)
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn queue_depth_changed(
        &self,
        guild: GuildId,
        notify_channel: ChannelId,
        depth: usize,
    ) -> Result<(), PlatformError> {
        self.check_failing()?;
        self.depth_updates
            .lock()
            .unwrap()
            .push((guild, notify_channel, depth));
        Ok(())
    }

    async fn config_warning(
        &self,
        guild: GuildId,
        notify_channel: ChannelId,
        warning: &str,
    ) -> Result<(), PlatformError> {
        self.check_failing()?;
        self.warnings
            .lock()
            .unwrap()
            .push((guild, notify_channel, warning.to_string()));
        Ok(())
    }
}
