//! Feed error types

use thiserror::Error;

/// Errors that can occur while fetching the event feed
///
/// All of them are transient from the relay's point of view: the cycle is
/// abandoned and the next tick tries again.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid feed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid access token: {0}")]
    InvalidToken(String),
}

impl FeedError {
    /// HTTP status, when the feed answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FeedError::Status { status, .. } => Some(*status),
            FeedError::Network(e) => e.status().map(|s| s.as_u16()),
            FeedError::Json(_) | FeedError::InvalidToken(_) => None,
        }
    }
}
