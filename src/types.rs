//! Core identifiers and records shared across the relay.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder substituted for newlines in durably stored submission text.
///
/// The validator rejects any submission containing this character, so the
/// substitution is always reversible.
pub const NEWLINE_PLACEHOLDER: char = '¬';

macro_rules! snowflake_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake_id!(GuildId, "A recipient guild (server) identifier.");
snowflake_id!(ChannelId, "A channel identifier within a guild or DM.");
snowflake_id!(RoleId, "A role identifier within a guild.");
snowflake_id!(UserId, "A platform user identifier.");

/// Where a submission originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// A private/direct channel between the submitter and the bot.
    Direct,
    /// A public text channel inside a guild.
    GuildText,
}

/// An inbound submission request, as delivered by the platform adapter.
#[derive(Debug, Clone)]
pub struct SubmissionEvent {
    pub guild: GuildId,
    pub submitter: UserId,
    pub channel_kind: ChannelKind,
    pub text: String,
}

/// One pending anonymous message awaiting a moderator decision.
///
/// `output_channel` is captured at submission time; config changes after
/// enqueue never redirect an already-queued entry. `content` is stored with
/// newlines replaced by [`NEWLINE_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Store-assigned FIFO key. `None` until the entry has been enqueued.
    pub id: Option<i64>,
    pub output_channel: ChannelId,
    pub content: String,
}

impl QueueEntry {
    pub fn new(output_channel: ChannelId, content: impl Into<String>) -> Self {
        Self {
            id: None,
            output_channel,
            content: content.into(),
        }
    }

    /// The submission text with newlines restored for display.
    pub fn display_content(&self) -> String {
        self.content.replace(NEWLINE_PLACEHOLDER, "\n")
    }
}

/// A moderator's signal during a review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny,
    Cancel,
}

/// Opaque handle to a message the platform delivered on our behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub u64);

/// Everything the external renderer needs to display an approved message.
///
/// The core never renders; it hands the renderer the restored body, the
/// chosen signoff, and the sequence number plus its derived color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedMessage {
    pub body: String,
    pub signoff: String,
    pub sequence: u64,
    pub color: u32,
}

/// The guilds the process currently belongs to, as reported at startup or
/// on join/leave events. Used to reconcile persisted state.
pub type KnownGuilds = HashSet<GuildId>;
