//! Cache generations for offline support.
//!
//! This module keeps the versioned active generation and the
//! version-independent fallback generation that serve requests when the
//! network is unavailable.

mod manager;
mod model;

pub use manager::CacheManager;
pub use model::CachedResponse;
