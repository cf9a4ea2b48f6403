//! Configuration types — process tunables and per-guild settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, RoleId};

/// Fallback signoffs appended to approved messages when a guild has not
/// configured its own.
pub const DEFAULT_SIGNOFFS: &[&str] = &[
    "- Anonymous",
    "- A little bird",
    "- Someone, somewhere",
    "- Yours truly, nobody",
];

/// Process-wide relay tunables.
#[derive(Debug, Clone)]
pub struct RelayLimits {
    /// Maximum submission length in characters.
    pub max_submission_len: usize,
    /// How long a submitter waits between accepted submissions.
    pub cooldown: Duration,
    /// Moderator inactivity timeout per presented entry.
    pub review_timeout: Duration,
    /// Maximum configured signoff length.
    pub max_signoff_len: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            max_submission_len: 1500,
            cooldown: Duration::from_secs(300), // 5 minutes
            review_timeout: Duration::from_secs(30),
            max_signoff_len: 200,
        }
    }
}

/// Durable per-guild settings.
///
/// One record per guild, created with defaults when the bot joins and
/// removed when it leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Destination for approved messages. Submissions are refused while unset.
    pub output_channel: Option<ChannelId>,
    /// Destination for queue-depth alerts and configuration warnings.
    pub notify_channel: Option<ChannelId>,
    /// Submitters holding this role are blocked when no ban-list capability
    /// is available.
    pub muted_role: Option<RoleId>,
    /// Appended to every approved message. Unset or empty picks a random
    /// entry from [`DEFAULT_SIGNOFFS`].
    pub signoff: Option<String>,
    /// Monotonic message sequence, starting at 1. Only decreases via an
    /// explicit moderator reset.
    pub counter: u64,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            output_channel: None,
            notify_channel: None,
            muted_role: None,
            signoff: None,
            counter: 1,
        }
    }
}
