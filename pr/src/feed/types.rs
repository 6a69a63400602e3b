//! Event feed types

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Event type tag used by the feed for branch pushes
pub const PUSH_EVENT: &str = "PushEvent";

/// One entry from the repository activity feed
///
/// The payload is kept as raw JSON because its shape depends on the event
/// type; push payloads are decoded on demand with [`Event::push_payload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Numeric id, sent as a string
    pub id: String,

    /// Event type tag, e.g. "PushEvent"
    #[serde(rename = "type")]
    pub kind: String,

    /// Who triggered the event
    pub actor: Actor,

    /// Repository the event belongs to
    pub repo: EventRepo,

    /// Type-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Decode a feed page entry by entry
///
/// Entries that do not match the [`Event`] shape are dropped with a warning,
/// so one odd entry cannot hide the rest of the page. Only a body that is not
/// a JSON array at all is an error.
pub fn decode_events(body: &str) -> Result<Vec<Event>, serde_json::Error> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let events = entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.get("id").cloned();
            match serde_json::from_value::<Event>(entry) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(event_id = ?id, error = %e, "Ignoring malformed feed entry");
                    None
                }
            }
        })
        .collect();
    Ok(events)
}

impl Event {
    /// Parse the string id into an integer
    ///
    /// Returns None (with a warning) for ids that are not numeric; such events
    /// cannot be ordered against the watermark.
    pub fn numeric_id(&self) -> Option<u64> {
        match self.id.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(event_id = %self.id, "Ignoring event with non-numeric id");
                None
            }
        }
    }

    /// Whether this is a push event
    pub fn is_push(&self) -> bool {
        self.kind == PUSH_EVENT
    }

    /// The pushed ref, if the payload carries one
    pub fn push_ref(&self) -> Option<&str> {
        self.payload.get("ref").and_then(|r| r.as_str())
    }

    /// Whether this is a push to `target_ref`
    pub fn is_push_to(&self, target_ref: &str) -> bool {
        self.is_push() && self.push_ref() == Some(target_ref)
    }

    /// Decode the payload as a push payload
    pub fn push_payload(&self) -> Option<PushPayload> {
        if !self.is_push() {
            return None;
        }
        match PushPayload::deserialize(&self.payload) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(event_id = %self.id, error = %e, "Malformed push payload");
                None
            }
        }
    }
}

/// Account that triggered an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// Repository reference attached to an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRepo {
    pub id: u64,
    /// Full name, owner/name
    pub name: String,
}

impl EventRepo {
    /// Owner part of the full name
    pub fn owner(&self) -> &str {
        self.name.split_once('/').map(|(owner, _)| owner).unwrap_or(&self.name)
    }

    /// Short name part of the full name
    pub fn short_name(&self) -> &str {
        self.name.split_once('/').map(|(_, name)| name).unwrap_or(&self.name)
    }
}

/// Payload of a push event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

/// A commit listed in a push payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub message: String,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default)]
    pub email: String,
}
