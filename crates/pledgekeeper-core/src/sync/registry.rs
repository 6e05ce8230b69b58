//! Background-sync tag registrations.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::trigger::{SyncHandle, SyncSignal};

/// Pending background-sync tags.
///
/// Registering a tag that is already pending is a no-op. When a
/// [`SyncHandle`] is attached, each new registration also wakes it.
#[derive(Debug, Clone, Default)]
pub struct SyncRegistry {
    tags: Arc<Mutex<BTreeSet<String>>>,
    waker: Arc<Mutex<Option<SyncHandle>>>,
}

impl SyncRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes `handle` on every new registration.
    pub fn attach(&self, handle: SyncHandle) {
        *self.waker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Registers `tag`. Returns false if it was already pending.
    pub fn register(&self, tag: &str) -> bool {
        let inserted = self
            .tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string());
        if !inserted {
            return false;
        }

        debug!(tag, "Registered background sync");
        if let Some(handle) = self
            .waker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.fire(SyncSignal::Tag(tag.to_string()));
        }
        true
    }

    /// Consumes a pending registration. Returns false if `tag` was not pending.
    pub fn take(&self, tag: &str) -> bool {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tag)
    }

    /// Whether `tag` is pending.
    #[must_use]
    pub fn is_pending(&self, tag: &str) -> bool {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tag)
    }

    /// Every pending tag, sorted.
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
