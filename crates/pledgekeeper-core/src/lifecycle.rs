//! Worker lifecycle events and version state.

use serde::{Deserialize, Serialize};

/// Event delivered to the engine by its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A new worker version is being installed.
    Install {
        /// Version being installed.
        version: String,
    },
    /// The waiting version should take over.
    Activate,
    /// Connectivity was restored.
    Online,
    /// A registered background-sync tag fired.
    Sync {
        /// The tag that fired.
        tag: String,
    },
}

/// Which worker versions are active and waiting.
///
/// A version moves `waiting -> active` exactly once; activating with
/// nothing waiting does nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerState {
    active: Option<String>,
    waiting: Option<String>,
}

impl WorkerState {
    /// Creates a state with nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The version currently serving requests.
    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The installed version waiting to activate.
    #[must_use]
    pub fn waiting(&self) -> Option<&str> {
        self.waiting.as_deref()
    }

    /// Records a freshly installed version. Replaces any earlier waiting one.
    pub fn install(&mut self, version: impl Into<String>) {
        self.waiting = Some(version.into());
    }

    /// Promotes the waiting version. Returns the previous active version
    /// paired with the new one, or `None` if nothing was waiting.
    pub fn promote(&mut self) -> Option<(Option<String>, String)> {
        let next = self.waiting.take()?;
        let previous = self.active.replace(next.clone());
        Some((previous, next))
    }
}
