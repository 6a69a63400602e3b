//! Outbound webhook notifications

mod payload;
mod sink;

pub use payload::{
    NotificationAuthor, NotificationCommit, NotificationOwner, NotificationRepository, NotificationSender,
    PushNotification,
};
pub use sink::{DeliveryError, EVENT_HEADER, HttpWebhook, WebhookSink};
