//! Submission rate limiter — per-submitter cooldowns with scheduled release.
//!
//! State is in-memory only: a restart clears every cooldown. Release is a
//! detached timer task, not a poll, so a submitter becomes eligible again
//! even if nothing else touches the limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::types::UserId;

/// Per-submitter cooldown registry.
pub struct Cooldowns {
    entries: Mutex<HashMap<UserId, Instant>>,
}

impl Cooldowns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Whether the submitter is currently blocked.
    ///
    /// An entry whose deadline has passed counts as released even if its
    /// timer task has not fired yet, so eligibility at exactly the window
    /// boundary never depends on scheduler latency.
    pub async fn is_limited(&self, submitter: UserId) -> bool {
        let entries = self.entries.lock().await;
        match entries.get(&submitter) {
            Some(expires_at) => *expires_at > Instant::now(),
            None => false,
        }
    }

    /// Start a cooldown for the submitter and schedule its release.
    ///
    /// A newer cooldown for the same submitter supersedes an older one; the
    /// older timer finds a different deadline on wake and leaves the entry
    /// alone.
    pub async fn start(self: &Arc<Self>, submitter: UserId, duration: Duration) {
        let expires_at = Instant::now() + duration;
        {
            let mut entries = self.entries.lock().await;
            entries.insert(submitter, expires_at);
        }
        debug!(submitter = %submitter, secs = duration.as_secs(), "Cooldown started");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            let mut entries = this.entries.lock().await;
            if entries.get(&submitter) == Some(&expires_at) {
                entries.remove(&submitter);
                debug!(submitter = %submitter, "Cooldown released");
            }
        });
    }

    /// Number of submitters currently registered (released or not).
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
