//! # pledgekeeper-core
//!
//! Offline donation capture for a donation-facing site.
//!
//! This crate provides:
//! - Versioned cache generations with an offline fallback page
//! - Request interception (network-first pages, cache-first assets)
//! - A durable `SQLite` queue of donations captured while offline
//! - Replay of captured donations once connectivity returns
//! - User notifications with complete/dismiss actions
//! - The control channel to the hosting page
//!
//! Hosts drive everything through [`Engine`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod control;
pub mod engine;
mod error;
pub mod id;
pub mod intercept;
pub mod lifecycle;
pub mod notify;
pub mod store;
pub mod sync;

pub use cache::{CacheManager, CachedResponse};
pub use config::EngineConfig;
pub use control::{ControlMessage, ControlReply, PageMessage};
pub use engine::{Engine, EventOutcome};
pub use error::{Error, Result};
pub use id::generate_id;
pub use intercept::{Interceptor, RequestClass, classify};
pub use lifecycle::{LifecycleEvent, WorkerState};
pub use notify::{
    DesktopSurface, LogSurface, Notification, NotificationAction, NotificationDispatcher,
    NotificationSurface, Outcome, RecordingSurface,
};
pub use store::{
    DonationIntent, DonationStatus, DonationStore, NewDonationIntent, NewOfflineDonation,
    OfflineDonationRecord, StatusCounts,
};
pub use sync::{
    ConnectivityTrigger, IntervalTrigger, ManualTrigger, ReplayOutcome, SyncCoordinator,
    SyncHandle, SyncRegistry, SyncReport, SyncSignal, SyncTrigger,
};
