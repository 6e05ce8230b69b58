//! # pledgekeeper-http
//!
//! Request/response model and network seam for the `PledgeKeeper` offline
//! donation engine.
//!
//! ## Features
//!
//! - **Request model**: method, mode, destination and body of an intercepted request
//! - **Response model**: status, headers and body snapshots that can be cached
//! - **[`Fetcher`]**: the single seam through which the engine reaches the network
//! - **[`HttpFetcher`]**: `reqwest`-backed fetcher with a request timeout
//! - **[`ScriptedFetcher`]**: scripted fetcher for dry runs and tests
//!
//! ## Quick Start
//!
//! ```ignore
//! use pledgekeeper_http::{Fetcher, HttpFetcher, Request};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> pledgekeeper_http::Result<()> {
//!     let fetcher = HttpFetcher::new(Duration::from_secs(10))?;
//!     let response = fetcher.fetch(&Request::navigate("https://give.example.org/")?).await?;
//!     println!("{} ({} bytes)", response.status, response.body.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod fetch;
pub mod request;
pub mod response;
pub mod scripted;

pub use error::{Error, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use request::{Destination, Method, Request, RequestMode};
pub use response::Response;
pub use scripted::{Route, ScriptedFetcher};
