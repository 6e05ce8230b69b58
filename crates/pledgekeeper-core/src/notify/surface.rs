//! Places a notification can be shown.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use super::model::Notification;
use crate::{Error, Result};

/// Somewhere notifications are shown to the user.
pub trait NotificationSurface: Send + Sync + 'static {
    /// Shows the notification, replacing any earlier one with the same tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface could not display it.
    fn show(&self, notification: &Notification) -> Result<()>;
}

/// Desktop notifications through the platform notification daemon.
#[derive(Debug, Clone)]
pub struct DesktopSurface {
    app_name: String,
}

impl DesktopSurface {
    /// Creates a surface that shows notifications under `app_name`.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl NotificationSurface for DesktopSurface {
    fn show(&self, notification: &Notification) -> Result<()> {
        let mut desktop = notify_rust::Notification::new();
        desktop
            .appname(&self.app_name)
            .summary(&notification.title)
            .body(&notification.body);
        for action in notification.actions {
            desktop.action(action.as_str(), action.label());
        }

        desktop
            .show()
            .map_err(|e| Error::Notification(e.to_string()))?;
        Ok(())
    }
}

/// Writes notifications to the log; for headless hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSurface;

impl NotificationSurface for LogSurface {
    fn show(&self, notification: &Notification) -> Result<()> {
        info!(
            tag = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every shown notification in memory.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingSurface {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification shown so far, in order.
    #[must_use]
    pub fn shown(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications shown so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl NotificationSurface for RecordingSurface {
    fn show(&self, notification: &Notification) -> Result<()> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}
