//! Control channel between the hosting page and the worker.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "SKIP_ACTIVATION"}
//! {"type": "GET_VERSION"}
//! {"type": "CLEAR_CACHE"}
//! {"type": "SYNC_NOW"}
//! {"type": "NOTIFICATION_ACTION", "action": "complete"}
//! ```

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::notify::NotificationAction;
use crate::sync::SyncReport;

/// Message from the hosting page to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting version now.
    SkipActivation,
    /// Ask for the active cache generation identifier.
    GetVersion,
    /// Delete every cache generation. The durable store is untouched.
    ClearCache,
    /// Run one sync cycle now.
    SyncNow,
    /// The user chose a notification action.
    NotificationAction {
        /// The chosen action.
        action: NotificationAction,
    },
}

impl ControlMessage {
    /// Decodes a message from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or names an unknown type.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Reply from the worker to a [`ControlMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    /// The waiting version was activated.
    Activated {
        /// Active cache generation after activation.
        version: Option<String>,
    },
    /// Active cache generation identifier.
    Version {
        /// `None` before the first activation.
        version: Option<String>,
    },
    /// Cache generations were deleted.
    CacheCleared {
        /// Number of generations removed.
        removed: usize,
    },
    /// A sync cycle finished.
    SyncComplete {
        /// Per-cycle counts.
        report: SyncReport,
    },
    /// A notification action was routed.
    ActionHandled {
        /// Message for the page, if the action needs one.
        page: Option<PageMessage>,
    },
    /// The message could not be handled.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// Message from the worker to the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageMessage {
    /// Navigate to a page-owned view.
    Navigate {
        /// Target URL or path.
        url: String,
    },
}
