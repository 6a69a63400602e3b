//! Push notification payload
//!
//! Mirrors the subset of the push webhook schema that chat platforms render:
//! ref, before/after, repository, sender, compare link, commits, head commit.

use serde::Serialize;
use tracing::debug;

use crate::feed::{Commit, Event, PushPayload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushNotification {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub repository: NotificationRepository,
    pub sender: NotificationSender,
    pub compare: String,
    pub commits: Vec<NotificationCommit>,
    pub head_commit: NotificationCommit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: NotificationOwner,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOwner {
    pub name: String,
    pub login: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSender {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationCommit {
    pub id: String,
    pub message: String,
    pub url: String,
    pub author: NotificationAuthor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAuthor {
    pub name: String,
    pub email: String,
}

impl PushNotification {
    /// Project a push event into the notification shape
    ///
    /// Returns None when the event is not a push, its payload does not decode,
    /// or it carries no commits (branch deletions, force pushes to an ancestor).
    pub fn from_event(event: &Event, html_base: &str) -> Option<Self> {
        let payload = event.push_payload()?;
        Self::from_push(event, &payload, html_base)
    }

    /// Project an already decoded push payload
    ///
    /// Returns None when the push carries no commits: there is no head commit
    /// to show.
    pub fn from_push(event: &Event, payload: &PushPayload, html_base: &str) -> Option<Self> {
        let html_base = html_base.trim_end_matches('/');
        let full_name = &event.repo.name;
        let repo_url = format!("{}/{}", html_base, full_name);

        let head = payload
            .commits
            .iter()
            .find(|c| c.sha == payload.head)
            .or_else(|| payload.commits.last());
        let Some(head) = head else {
            debug!(event_id = %event.id, "from_push: push has no commits");
            return None;
        };

        let owner = event.repo.owner().to_string();
        Some(Self {
            git_ref: payload.git_ref.clone(),
            before: payload.before.clone(),
            after: payload.head.clone(),
            repository: NotificationRepository {
                id: event.repo.id,
                name: event.repo.short_name().to_string(),
                full_name: full_name.clone(),
                owner: NotificationOwner {
                    name: owner.clone(),
                    login: owner.clone(),
                    html_url: format!("{}/{}", html_base, owner),
                },
                html_url: repo_url.clone(),
            },
            sender: NotificationSender {
                login: event.actor.login.clone(),
                id: event.actor.id,
                avatar_url: event.actor.avatar_url.clone(),
                html_url: format!("{}/{}", html_base, event.actor.login),
            },
            compare: format!("{}/compare/{}...{}", repo_url, payload.before, payload.head),
            commits: payload.commits.iter().map(|c| NotificationCommit::new(c, &repo_url)).collect(),
            head_commit: NotificationCommit::new(head, &repo_url),
        })
    }
}

impl NotificationCommit {
    fn new(commit: &Commit, repo_url: &str) -> Self {
        Self {
            id: commit.sha.clone(),
            message: commit.message.clone(),
            url: format!("{}/commit/{}", repo_url, commit.sha),
            author: NotificationAuthor {
                name: commit.author.name.clone(),
                email: commit.author.email.clone(),
            },
        }
    }
}
