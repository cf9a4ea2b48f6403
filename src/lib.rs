//! Anonymous relay core.
//!
//! Relays user-submitted text anonymously into a destination channel after
//! optional moderator approval. The chat-platform plumbing lives behind the
//! traits in [`platform`]; everything here is the pipeline itself: intake
//! validation, durable per-guild FIFO queues, moderated review sessions,
//! per-submitter cooldowns, and per-guild configuration.

pub mod config;
pub mod cooldown;
pub mod error;
pub mod platform;
pub mod relay;
pub mod render;
pub mod review;
pub mod store;
pub mod testing;
pub mod types;
pub mod validate;
