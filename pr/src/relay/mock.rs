//! Test doubles for the relay: scripted feed, recording sink, broken store

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::feed::{Event, EventFeed, FeedError};
use crate::watermark::{StoreError, WatermarkStore};
use crate::webhook::{DeliveryError, PushNotification, WebhookSink};

/// Push event whose head sha encodes its id as `sha{id}`
pub fn push_event(id: u64, git_ref: &str) -> Event {
    serde_json::from_value(json!({
        "id": id.to_string(),
        "type": "PushEvent",
        "actor": {"id": 1, "login": "octocat", "avatar_url": "https://avatars.example.com/u/1"},
        "repo": {"id": 1296269, "name": "octocat/Hello-World"},
        "payload": {
            "ref": git_ref,
            "before": format!("sha{}", id.saturating_sub(1)),
            "head": format!("sha{}", id),
            "commits": [
                {"sha": format!("sha{}", id), "message": format!("Commit {}", id), "author": {"name": "Octo Cat", "email": "octo@example.com"}}
            ]
        }
    }))
    .expect("valid push event")
}

pub fn push_event_without_commits(id: u64, git_ref: &str) -> Event {
    let mut event = push_event(id, git_ref);
    event.payload["commits"] = json!([]);
    event
}

/// Push to `git_ref` whose commit list is not a list
pub fn push_event_with_malformed_payload(id: u64, git_ref: &str) -> Event {
    let mut event = push_event(id, git_ref);
    event.payload["commits"] = json!("oops");
    event
}

pub fn watch_event(id: u64) -> Event {
    serde_json::from_value(json!({
        "id": id.to_string(),
        "type": "WatchEvent",
        "actor": {"login": "someone"},
        "repo": {"id": 1296269, "name": "octocat/Hello-World"},
        "payload": {"action": "started"}
    }))
    .expect("valid watch event")
}

fn id_from_sha(sha: &str) -> u64 {
    sha.trim_start_matches("sha").parse().unwrap_or(0)
}

/// Feed that serves the same page (or the same failure) on every call
pub struct MockFeed {
    page: Vec<Event>,
    fail_status: Option<u16>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFeed {
    pub fn new(page: Vec<Event>) -> Self {
        Self {
            page,
            fail_status: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::new(vec![])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFeed for MockFeed {
    async fn fetch_recent(&self) -> Result<Vec<Event>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.fail_status {
            Some(status) => Err(FeedError::Status {
                status,
                message: "Internal Server Error".to_string(),
            }),
            None => Ok(self.page.clone()),
        }
    }
}

/// Sink that records every attempt and fails for chosen event ids
#[derive(Default)]
pub struct MockSink {
    fail_ids: HashSet<u64>,
    attempts: Mutex<Vec<u64>>,
    delivered: Mutex<Vec<u64>>,
    observed_store: Option<Arc<MemoryWatermarkStore>>,
    watermarks_seen: Mutex<Vec<Option<u64>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: &[u64]) -> Self {
        Self {
            fail_ids: ids.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Record the store's watermark at the moment of each delivery
    pub fn observing(store: Arc<MemoryWatermarkStore>) -> Self {
        Self {
            observed_store: Some(store),
            ..Self::default()
        }
    }

    pub fn delivered_ids(&self) -> Vec<u64> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn watermarks_seen(&self) -> Vec<Option<u64>> {
        self.watermarks_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSink for MockSink {
    async fn deliver(&self, notification: &PushNotification) -> Result<(), DeliveryError> {
        let id = id_from_sha(&notification.after);
        self.attempts.lock().unwrap().push(id);

        if let Some(store) = &self.observed_store {
            self.watermarks_seen.lock().unwrap().push(store.get().unwrap());
        }

        if self.fail_ids.contains(&id) {
            return Err(DeliveryError::Status {
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(id);
        Ok(())
    }
}

/// Store whose every operation fails
pub struct FailingStore;

impl WatermarkStore for FailingStore {
    fn get(&self) -> Result<Option<u64>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk gone")))
    }

    fn set(&self, _value: u64) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk gone")))
    }
}

/// Watermark held in memory
///
/// Counts writes so callers can check how often a cycle committed.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    value: Mutex<Option<u64>>,
    writes: AtomicUsize,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-committed watermark
    pub fn with_value(value: u64) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful `set` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self) -> Result<Option<u64>, StoreError> {
        Ok(*self.value.lock().map_err(|_| StoreError::Poisoned)?)
    }

    fn set(&self, value: u64) -> Result<(), StoreError> {
        *self.value.lock().map_err(|_| StoreError::Poisoned)? = Some(value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

mod tests {
    use super::*;

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryWatermarkStore::new();
        assert_eq!(store.get().unwrap(), None);

        store.set(3).unwrap();
        store.set(5).unwrap();
        assert_eq!(store.get().unwrap(), Some(5));
        assert_eq!(store.write_count(), 2);

        let seeded = MemoryWatermarkStore::with_value(9);
        assert_eq!(seeded.get().unwrap(), Some(9));
        assert_eq!(seeded.write_count(), 0);
    }
}
