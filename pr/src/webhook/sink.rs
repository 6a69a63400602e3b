//! WebhookSink trait and the HTTP implementation

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::PushNotification;

/// Header the chat platform uses to pick the payload parser
pub const EVENT_HEADER: &str = "x-github-event";

/// Errors that can occur while delivering one notification
///
/// Delivery errors are scoped to a single event: they are logged and the
/// cycle moves on to the next event.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Destination for push notifications
#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// Deliver a single notification
    async fn deliver(&self, notification: &PushNotification) -> Result<(), DeliveryError>;
}

/// Webhook endpoint reached with a JSON POST
pub struct HttpWebhook {
    http: Client,
    url: String,
}

impl HttpWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .user_agent(concat!("pushrelay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl WebhookSink for HttpWebhook {
    async fn deliver(&self, notification: &PushNotification) -> Result<(), DeliveryError> {
        debug!(after = %notification.after, "deliver: called");
        let response = self
            .http
            .post(&self.url)
            .header(EVENT_HEADER, "push")
            .json(notification)
            .send()
            .await?;

        // The chat platform answers 204 No Content on success
        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
