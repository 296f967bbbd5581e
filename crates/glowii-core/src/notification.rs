//! Transient user-facing notifications
//!
//! Every workflow failure is converted into a [`Notification`] at the operation boundary. Hosts
//! plug in their own [`Notifier`] to present them; [`TracingNotifier`] logs them and
//! [`RecordingNotifier`] keeps them in memory.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind, ErrorMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Error class when the notification reports a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            kind: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
            kind: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
            kind: None,
        }
    }

    /// Notification for a failed operation. Preconditions are reported as warnings.
    pub fn from_error(err: &AppError) -> Self {
        let level = match err.kind() {
            ErrorKind::Precondition => NotificationLevel::Warning,
            _ => NotificationLevel::Error,
        };
        Self {
            level,
            message: err.client_message(),
            kind: Some(err.kind()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Sink for user-facing notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes notifications to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(level = ?notification.level, "{}", notification.message)
            }
            NotificationLevel::Warning => {
                tracing::warn!(kind = ?notification.kind, "{}", notification.message)
            }
            NotificationLevel::Error => {
                tracing::error!(kind = ?notification.kind, "{}", notification.message)
            }
        }
    }
}

/// Notifier that records every notification in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.entries().iter().any(|n| n.kind == Some(kind))
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
