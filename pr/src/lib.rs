//! PushRelay - branch push notifications from a repository activity feed
//!
//! PushRelay polls a repository's public event feed on a fixed interval,
//! picks out push events on one branch, and forwards each of them to a chat
//! webhook in the push-event shape the chat platform understands.
//!
//! # Core Concepts
//!
//! - **Watermark**: the id of the newest event already handled, stored in SQLite
//! - **Commit before deliver**: the watermark advances once per cycle, before any
//!   webhook call, so a crash never re-announces an event
//! - **One cycle at a time**: the timer never starts a cycle while one is running
//!
//! # Modules
//!
//! - [`feed`] - event feed types and the HTTP feed client
//! - [`webhook`] - outbound notification payload and webhook sink
//! - [`watermark`] - durable watermark store
//! - [`relay`] - the poll-and-deliver cycle and its timer loop
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod feed;
pub mod relay;
pub mod watermark;
pub mod webhook;

// Re-export commonly used types
pub use config::{Config, PollConfig, SourceConfig, StorageConfig, WebhookConfig};
pub use feed::{Actor, Commit, CommitAuthor, Event, EventFeed, EventRepo, FeedError, GithubFeed, PushPayload};
pub use relay::{CycleOutcome, Relay, RelayError, select_new_events};
pub use watermark::{SqliteWatermarkStore, StoreError, WatermarkStore};
pub use webhook::{DeliveryError, HttpWebhook, PushNotification, WebhookSink};

/// Key under which the watermark is persisted
pub const WATERMARK_KEY: &str = "last_seen_event_id";

/// Largest page the feed endpoint will return
pub const MAX_PAGE_SIZE: u32 = 100;
