//! Request classification.

use pledgekeeper_http::{Destination, Method, Request, RequestMode};

/// How an intercepted request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// A donation form posted while offline.
    DonationSubmit,
    /// A page load.
    Navigation,
    /// Script, style, image or font.
    StaticAsset,
    /// Any other `GET`.
    Other,
    /// A non-`GET` request that goes straight to the network.
    Passthrough,
}

/// Classifies a request.
///
/// `submit_path` is the path offline donation forms are posted to.
#[must_use]
pub fn classify(request: &Request, submit_path: &str) -> RequestClass {
    if request.method == Method::Post && request.path() == submit_path {
        return RequestClass::DonationSubmit;
    }
    if request.method != Method::Get {
        return RequestClass::Passthrough;
    }
    if request.mode == RequestMode::Navigate || request.destination == Destination::Document {
        return RequestClass::Navigation;
    }
    if request.destination.is_static_asset() {
        return RequestClass::StaticAsset;
    }
    RequestClass::Other
}
