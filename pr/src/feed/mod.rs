//! Repository event feed
//!
//! Types for the activity feed entries and the client that fetches one page
//! of them per poll.

mod client;
mod error;
mod types;

pub use client::{EventFeed, GithubFeed};
pub use error::FeedError;
pub use types::{Actor, Commit, CommitAuthor, Event, EventRepo, PUSH_EVENT, PushPayload, decode_events};
