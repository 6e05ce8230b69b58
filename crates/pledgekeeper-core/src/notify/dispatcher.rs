//! Outcome fan-out to the notification surface.

use std::sync::Arc;

use tracing::{debug, warn};

use super::model::{Notification, NotificationAction, Outcome};
use super::surface::NotificationSurface;
use crate::control::PageMessage;

/// Turns outcomes into notifications and routes actions back to the page.
///
/// Stateless apart from the surface handle. Surface failures are logged and
/// never reach the caller.
#[derive(Debug)]
pub struct NotificationDispatcher<S> {
    surface: Arc<S>,
    resume_url: String,
}

impl<S> Clone for NotificationDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            surface: Arc::clone(&self.surface),
            resume_url: self.resume_url.clone(),
        }
    }
}

impl<S: NotificationSurface> NotificationDispatcher<S> {
    /// Creates a dispatcher; `complete` actions navigate to `resume_url`.
    #[must_use]
    pub fn new(surface: Arc<S>, resume_url: impl Into<String>) -> Self {
        Self {
            surface,
            resume_url: resume_url.into(),
        }
    }

    /// The underlying surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Shows the notification for an outcome. Returns `None` if the surface failed.
    pub fn dispatch(&self, outcome: &Outcome) -> Option<Notification> {
        let notification = Notification::for_outcome(outcome);
        match self.surface.show(&notification) {
            Ok(()) => {
                debug!(tag = %notification.tag, "Notification shown");
                Some(notification)
            }
            Err(e) => {
                warn!(tag = %notification.tag, error = %e, "Failed to show notification");
                None
            }
        }
    }

    /// Routes a chosen action back to the hosting page.
    ///
    /// `complete` asks the page to navigate to the resume view; `dismiss`
    /// does nothing.
    #[must_use]
    pub fn handle_action(&self, action: NotificationAction) -> Option<PageMessage> {
        match action {
            NotificationAction::Complete => Some(PageMessage::Navigate {
                url: self.resume_url.clone(),
            }),
            NotificationAction::Dismiss => None,
        }
    }
}
