//! User-facing notifications for capture and replay outcomes.

mod dispatcher;
mod model;
mod surface;

pub use dispatcher::NotificationDispatcher;
pub use model::{Notification, NotificationAction, Outcome};
pub use surface::{DesktopSurface, LogSurface, NotificationSurface, RecordingSurface};
