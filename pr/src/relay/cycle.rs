//! One poll-and-deliver cycle
//!
//! Fetching -> Filtering -> Committing -> Delivering. The watermark is written
//! once, after filtering and before the first delivery, so a crash or a failed
//! delivery can lose the rest of a batch but never repeats an event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::RelayError;
use crate::feed::{Event, EventFeed};
use crate::watermark::WatermarkStore;
use crate::webhook::{PushNotification, WebhookSink};

/// A push event that passed filtering, with its parsed id
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub id: u64,
    pub event: Event,
}

/// What a single cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The feed could not be read; nothing changed
    FetchFailed(String),
    /// The page held no push to the target ref
    NoPushEvents,
    /// Every push on the page is at or below the watermark
    NoNewEvents,
    /// The watermark advanced and the batch was handed to the webhook
    Delivered(CycleReport),
}

/// Per-event results of a cycle that committed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Watermark committed before delivery
    pub watermark: u64,
    /// Ids accepted by the webhook, in delivery order
    pub delivered: Vec<u64>,
    /// Ids the webhook rejected or could not be reached for
    pub failed: Vec<u64>,
    /// Ids with nothing to announce (pushes without commits)
    pub skipped: Vec<u64>,
    /// Ids whose push payload could not be decoded
    pub malformed: Vec<u64>,
}

/// Keep pushes to `target_ref`, oldest first
///
/// The feed serves newest first; the page is reversed and then ordered by id
/// so delivery order is strictly increasing even if the page is not. Repeated
/// ids and ids that are not numeric are dropped.
pub fn push_events_oldest_first(events: Vec<Event>, target_ref: &str) -> Vec<PendingEvent> {
    let mut pushes: Vec<PendingEvent> = events
        .into_iter()
        .rev()
        .filter(|e| e.is_push_to(target_ref))
        .filter_map(|event| event.numeric_id().map(|id| PendingEvent { id, event }))
        .collect();
    pushes.sort_by_key(|p| p.id);
    pushes.dedup_by_key(|p| p.id);
    pushes
}

/// Keep events strictly newer than the watermark
pub fn select_new_events(pushes: Vec<PendingEvent>, watermark: u64) -> Vec<PendingEvent> {
    pushes.into_iter().filter(|p| p.id > watermark).collect()
}

/// The poll-and-deliver loop
pub struct Relay {
    feed: Arc<dyn EventFeed>,
    sink: Arc<dyn WebhookSink>,
    store: Arc<dyn WatermarkStore>,
    target_ref: String,
    html_base: String,
}

impl Relay {
    pub fn new(
        feed: Arc<dyn EventFeed>,
        sink: Arc<dyn WebhookSink>,
        store: Arc<dyn WatermarkStore>,
        target_ref: impl Into<String>,
        html_base: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            sink,
            store,
            target_ref: target_ref.into(),
            html_base: html_base.into(),
        }
    }

    /// Run a single cycle
    ///
    /// Only a watermark store failure is returned as an error.
    pub async fn poll_once(&self) -> Result<CycleOutcome, RelayError> {
        debug!(target_ref = %self.target_ref, "poll_once: called");

        let watermark = match self.store.get()? {
            Some(w) => w,
            None => {
                info!("No last seen event id found, starting from 0");
                0
            }
        };

        // Fetching
        let events = match self.feed.fetch_recent().await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, status = ?e.status(), "Failed to fetch events");
                return Ok(CycleOutcome::FetchFailed(e.to_string()));
            }
        };
        debug!(count = events.len(), watermark, "poll_once: fetched page");

        // Filtering
        let pushes = push_events_oldest_first(events, &self.target_ref);
        if pushes.is_empty() {
            info!(target_ref = %self.target_ref, "No push events found");
            return Ok(CycleOutcome::NoPushEvents);
        }

        let new_events = select_new_events(pushes, watermark);
        let Some(last) = new_events.last() else {
            info!(watermark, "No new events since last check");
            return Ok(CycleOutcome::NoNewEvents);
        };

        // Committing
        let committed = last.id;
        self.store.set(committed)?;
        info!(
            previous = watermark,
            watermark = committed,
            count = new_events.len(),
            "Watermark advanced"
        );

        // Delivering
        let mut report = CycleReport {
            watermark: committed,
            ..Default::default()
        };
        for pending in &new_events {
            let Some(payload) = pending.event.push_payload() else {
                warn!(event_id = pending.id, "Push payload is malformed, nothing to send");
                report.malformed.push(pending.id);
                continue;
            };
            let Some(notification) = PushNotification::from_push(&pending.event, &payload, &self.html_base) else {
                warn!(event_id = pending.id, "Push has no commits, nothing to send");
                report.skipped.push(pending.id);
                continue;
            };

            match self.sink.deliver(&notification).await {
                Ok(()) => {
                    info!(event_id = pending.id, after = %notification.after, "Webhook sent successfully");
                    report.delivered.push(pending.id);
                }
                Err(e) => {
                    warn!(event_id = pending.id, error = %e, "Failed to send webhook");
                    report.failed.push(pending.id);
                }
            }
        }

        Ok(CycleOutcome::Delivered(report))
    }

    /// Run cycles on a fixed interval until shutdown
    ///
    /// Each cycle runs to completion inside the loop, so a slow cycle delays
    /// the next tick instead of overlapping it; missed ticks are skipped. A
    /// shutdown signal is checked before every tick.
    pub async fn run(&self, interval: Duration, mut shutdown_rx: mpsc::Receiver<()>) -> Result<(), RelayError> {
        info!(interval_secs = interval.as_secs(), target_ref = %self.target_ref, "Relay started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    debug!("run: shutdown signal received");
                    info!("Relay stopping");
                    break;
                }

                _ = ticker.tick() => {
                    let outcome = self.poll_once().await?;
                    debug!(?outcome, "run: cycle complete");
                }
            }
        }

        Ok(())
    }
}
