//! Durable store for donation intents and offline donation records.
//!
//! Backed by `SQLite`, with an additive-only versioned schema. The store
//! exclusively owns every persisted record; other components go through
//! [`DonationStore`].

mod model;
mod repository;
pub mod schema;

pub use model::{
    DEFAULT_DONATION_TYPE, DonationIntent, DonationStatus, NewDonationIntent, NewOfflineDonation,
    OfflineDonationRecord, StatusCounts,
};
pub use repository::DonationStore;
