//! Error types for the anonymous relay.

use crate::types::GuildId;

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Submission rejected: {0}")]
    Rejected(#[from] RejectionReason),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Signoff too long: maximum {max} characters.")]
    SignoffTooLong { max: usize },
}

/// Why a submission was refused at intake.
///
/// These are user-facing: the message text is shown to the submitter and to
/// nobody else. A rejection must never reach moderators or the notify
/// channel — anonymity holds even for refused submissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("This command can only be used when directly messaging me.")]
    WrongChannelKind,

    #[error("You've already sent a message in the last 5 minutes.")]
    Cooldown,

    #[error("You haven't typed anything to send!")]
    EmptyMessage,

    #[error(
        "We have a character limit of {max}, to make sure the platform doesn't shout at us when transferring your message."
    )]
    TooLong { max: usize },

    #[error("Sorry, you can't send a message with the ¬ character in.")]
    ForbiddenCharacter,

    #[error("Currently, no output channel is set by the server.")]
    NoOutputConfigured,

    #[error("Sorry, you're currently banned from that server.")]
    Banned,

    #[error("Sorry, you're currently muted in that server.")]
    Muted,
}

/// Durable storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Guild {guild} not found")]
    NotFound { guild: GuildId },

    #[error("Queue head changed under the caller")]
    Conflict,

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Review session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A review session is already running for this server.")]
    Busy,

    #[error("No output channel has been set for this server.")]
    NoOutputConfigured,
}

/// Errors surfaced by the chat-platform collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    /// Delivery failures worth one retry (rate limits, gateway hiccups).
    #[error("Transient platform failure: {0}")]
    Transient(String),

    #[error("Platform entity not found: {0}")]
    NotFound(String),

    #[error("Missing platform permission: {0}")]
    PermissionDenied(String),
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, RelayError>;
