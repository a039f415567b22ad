use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::errors::ServiceError;

/// A toast-style message reporting the outcome of an operation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, description)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, description)
    }

    /// Error notification carrying the user-safe message of `err`.
    pub fn failure(title: impl Into<String>, err: &ServiceError) -> Self {
        Self::new(NotificationKind::Error, title, err.user_message())
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Destination for user-facing notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Delivers through `sink`, logging instead of failing when delivery breaks.
pub async fn notify_or_log(sink: &dyn NotificationSink, notification: Notification) {
    let title = notification.title.clone();
    if let Err(e) = sink.notify(notification).await {
        warn!(error = %e, %title, "Dropping notification");
    }
}

/// Emits every notification as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        let Notification {
            title,
            description,
            kind,
            ..
        } = notification;
        match kind {
            NotificationKind::Error => error!(%kind, %title, %description, "notification"),
            NotificationKind::Warning => warn!(%kind, %title, %description, "notification"),
            NotificationKind::Success | NotificationKind::Info => {
                info!(%kind, %title, %description, "notification")
            }
        }
        Ok(())
    }
}

/// Keeps delivered notifications in memory, newest last.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|delivered| delivered.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.notifications().iter().map(|n| n.kind).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.clear();
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.delivered
            .lock()
            .map_err(|e| NotificationError::Delivery(e.to_string()))?
            .push(notification);
        Ok(())
    }
}
