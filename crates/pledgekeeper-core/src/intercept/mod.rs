//! Request interception.
//!
//! Every request the page makes is classified and answered by one of four
//! strategies:
//!
//! | Class | Strategy |
//! |---|---|
//! | donation submit | persist, acknowledge `202`, sync later |
//! | navigation | network first, then cache, then the offline page |
//! | static asset | cache first, revalidate in the background |
//! | other `GET` | any cache generation, then network |
//!
//! Non-`GET` requests go straight to the network.

mod classify;
mod interceptor;

pub use classify::{RequestClass, classify};
pub use interceptor::Interceptor;
