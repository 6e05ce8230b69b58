//! Reconciliation of captured donations with the server.
//!
//! A [`SyncTrigger`] decides *when* to sync; the [`SyncCoordinator`] drains
//! the durable store and replays each pending record.

mod coordinator;
mod registry;
mod trigger;

pub use coordinator::{ReplayOutcome, SyncCoordinator, SyncReport};
pub use registry::SyncRegistry;
pub use trigger::{
    ConnectivityTrigger, IntervalTrigger, ManualTrigger, SyncHandle, SyncSignal, SyncTrigger,
};
