//! Submission intake validation.
//!
//! Checks run in a fixed order and short-circuit at the first failure. A
//! rejection carries user-facing text for the submitter and is reported to
//! nobody else: moderators never learn who was refused, or why.

use tracing::warn;

use crate::config::{GuildConfig, RelayLimits};
use crate::cooldown::Cooldowns;
use crate::error::RejectionReason;
use crate::platform::{ChatClient, Notifier};
use crate::types::{NEWLINE_PLACEHOLDER, QueueEntry, SubmissionEvent};

/// Validate a submission against intake policy and the guild's config.
///
/// On success returns the queue-ready entry: text placeholder-encoded for
/// single-line storage, output channel captured from the config as it is
/// right now. The caller owns enqueueing, the cooldown, and notification.
pub async fn validate(
    event: &SubmissionEvent,
    config: &GuildConfig,
    limits: &RelayLimits,
    cooldowns: &Cooldowns,
    platform: &dyn ChatClient,
    notifier: &dyn Notifier,
) -> Result<QueueEntry, RejectionReason> {
    if event.channel_kind != crate::types::ChannelKind::Direct {
        return Err(RejectionReason::WrongChannelKind);
    }

    if cooldowns.is_limited(event.submitter).await {
        return Err(RejectionReason::Cooldown);
    }

    if event.text.is_empty() {
        return Err(RejectionReason::EmptyMessage);
    }

    if event.text.chars().count() > limits.max_submission_len {
        return Err(RejectionReason::TooLong {
            max: limits.max_submission_len,
        });
    }

    if event.text.contains(NEWLINE_PLACEHOLDER) {
        return Err(RejectionReason::ForbiddenCharacter);
    }

    let Some(output_channel) = config.output_channel else {
        return Err(RejectionReason::NoOutputConfigured);
    };

    // Ban check when the bot can read the ban list; otherwise fall back to
    // the muted-role check.
    let bans = match platform.get_bans(event.guild).await {
        Ok(bans) => bans,
        Err(e) => {
            warn!(guild = %event.guild, error = %e, "Ban list unavailable");
            None
        }
    };

    match bans {
        Some(banned) => {
            if banned.contains(&event.submitter) {
                return Err(RejectionReason::Banned);
            }
        }
        None => {
            if let Some(role) = config.muted_role {
                if platform.resolve_role(event.guild, role).await {
                    match platform.member_has_role(event.guild, event.submitter, role).await {
                        Ok(true) => return Err(RejectionReason::Muted),
                        Ok(false) => {}
                        Err(e) => {
                            warn!(guild = %event.guild, error = %e, "Muted-role check failed");
                        }
                    }
                } else if let Some(notify) = config.notify_channel {
                    // Configuration drift: warn, never block the submission.
                    warn!(guild = %event.guild, role = %role, "Muted role no longer resolves");
                    if let Err(e) = notifier
                        .config_warning(
                            event.guild,
                            notify,
                            "The muted role was not found. WARNING: muted members can still \
                             submit messages. Disable or re-assign the role.",
                        )
                        .await
                    {
                        warn!(guild = %event.guild, error = %e, "Drift warning failed to deliver");
                    }
                }
            }
        }
    }

    let content = event.text.replace('\n', &NEWLINE_PLACEHOLDER.to_string());
    Ok(QueueEntry::new(output_channel, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNotifier, FakePlatform};
    use crate::types::{ChannelId, ChannelKind, GuildId, RoleId, UserId};

    fn event(text: &str) -> SubmissionEvent {
        SubmissionEvent {
            guild: GuildId(1),
            submitter: UserId(10),
            channel_kind: ChannelKind::Direct,
            text: text.to_string(),
        }
    }

    fn configured() -> GuildConfig {
        GuildConfig {
            output_channel: Some(ChannelId(100)),
            notify_channel: Some(ChannelId(101)),
            ..Default::default()
        }
    }

    async fn run(
        event: &SubmissionEvent,
        config: &GuildConfig,
        platform: &FakePlatform,
        notifier: &FakeNotifier,
    ) -> Result<QueueEntry, RejectionReason> {
        let cooldowns = Cooldowns::new();
        validate(event, config, &RelayLimits::default(), &cooldowns, platform, notifier).await
    }

    #[tokio::test]
    async fn accepts_and_captures_output_channel() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let entry = run(&event("hello there"), &configured(), &platform, &notifier)
            .await
            .unwrap();
        assert_eq!(entry.output_channel, ChannelId(100));
        assert_eq!(entry.content, "hello there");
    }

    #[tokio::test]
    async fn encodes_newlines() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let entry = run(&event("two\nlines"), &configured(), &platform, &notifier)
            .await
            .unwrap();
        assert_eq!(entry.content, "two¬lines");
        assert_eq!(entry.display_content(), "two\nlines");
    }

    #[tokio::test]
    async fn rejects_guild_channel_origin() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let mut ev = event("hi");
        ev.channel_kind = ChannelKind::GuildText;
        let err = run(&ev, &configured(), &platform, &notifier).await.unwrap_err();
        assert_eq!(err, RejectionReason::WrongChannelKind);
    }

    #[tokio::test]
    async fn rejects_rate_limited_submitter() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();
        let cooldowns = Cooldowns::new();
        cooldowns
            .start(UserId(10), std::time::Duration::from_secs(300))
            .await;

        let err = validate(
            &event("hi"),
            &configured(),
            &RelayLimits::default(),
            &cooldowns,
            &platform,
            &notifier,
        )
        .await
        .unwrap_err();
        assert_eq!(err, RejectionReason::Cooldown);
    }

    #[tokio::test]
    async fn rejects_empty_text() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let err = run(&event(""), &configured(), &platform, &notifier).await.unwrap_err();
        assert_eq!(err, RejectionReason::EmptyMessage);
    }

    #[tokio::test]
    async fn rejects_over_length() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let long = "x".repeat(1501);
        let err = run(&event(&long), &configured(), &platform, &notifier).await.unwrap_err();
        assert_eq!(err, RejectionReason::TooLong { max: 1500 });

        // Exactly at the limit is fine.
        let exact = "x".repeat(1500);
        assert!(run(&event(&exact), &configured(), &platform, &notifier).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_placeholder_character() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let err = run(&event("sneaky ¬ char"), &configured(), &platform, &notifier)
            .await
            .unwrap_err();
        assert_eq!(err, RejectionReason::ForbiddenCharacter);
    }

    #[tokio::test]
    async fn rejects_without_output_channel() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();

        let err = run(&event("hi"), &GuildConfig::default(), &platform, &notifier)
            .await
            .unwrap_err();
        assert_eq!(err, RejectionReason::NoOutputConfigured);
    }

    #[tokio::test]
    async fn rejects_banned_submitter() {
        let platform = FakePlatform::new();
        platform.set_bans([UserId(10)]);
        let notifier = FakeNotifier::new();

        let err = run(&event("hi"), &configured(), &platform, &notifier).await.unwrap_err();
        assert_eq!(err, RejectionReason::Banned);
    }

    #[tokio::test]
    async fn ban_capability_bypasses_muted_role() {
        // With a readable (empty) ban list, the muted role is not consulted.
        let platform = FakePlatform::new();
        platform.set_bans([]);
        platform.add_role(GuildId(1), RoleId(50));
        platform.give_role(GuildId(1), UserId(10), RoleId(50));
        let notifier = FakeNotifier::new();

        let mut config = configured();
        config.muted_role = Some(RoleId(50));
        assert!(run(&event("hi"), &config, &platform, &notifier).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_muted_submitter_without_ban_capability() {
        let platform = FakePlatform::new();
        platform.add_role(GuildId(1), RoleId(50));
        platform.give_role(GuildId(1), UserId(10), RoleId(50));
        let notifier = FakeNotifier::new();

        let mut config = configured();
        config.muted_role = Some(RoleId(50));
        let err = run(&event("hi"), &config, &platform, &notifier).await.unwrap_err();
        assert_eq!(err, RejectionReason::Muted);
    }

    #[tokio::test]
    async fn failed_drift_warning_delivery_still_accepts() {
        let platform = FakePlatform::new();
        let notifier = FakeNotifier::new();
        notifier.set_failing(true);

        let mut config = configured();
        config.muted_role = Some(RoleId(50)); // never added → does not resolve
        let entry = run(&event("hi"), &config, &platform, &notifier).await.unwrap();
        assert_eq!(entry.content, "hi");
        assert_eq!(notifier.warning_count(), 0);
    }

    #[tokio::test]
    async fn unresolvable_muted_role_warns_but_accepts() {
        let platform = FakePlatform::new(); // role never added → does not resolve
        let notifier = FakeNotifier::new();

        let mut config = configured();
        config.muted_role = Some(RoleId(50));
        let entry = run(&event("hi"), &config, &platform, &notifier).await.unwrap();
        assert_eq!(entry.content, "hi");
        assert_eq!(notifier.warning_count(), 1);
    }
}
