//! Intercepted request model.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// Returns the wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// How the request was issued by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    /// Same-origin subresource or API call.
    #[default]
    SameOrigin,
    /// Cross-origin request with CORS.
    Cors,
    /// Opaque cross-origin request.
    NoCors,
}

/// What the response is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// HTML document.
    Document,
    /// Script.
    Script,
    /// Stylesheet.
    Style,
    /// Image.
    Image,
    /// Web font.
    Font,
    /// No particular destination (fetch/XHR).
    #[default]
    Empty,
}

impl Destination {
    /// Returns true for script, style, image and font destinations.
    #[must_use]
    pub const fn is_static_asset(self) -> bool {
        matches!(self, Self::Script | Self::Style | Self::Image | Self::Font)
    }
}

/// A request intercepted between the page and the network.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request mode.
    pub mode: RequestMode,
    /// Request destination.
    pub destination: Destination,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a request with the given method and URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        Ok(Self {
            method,
            url: Url::parse(url)?,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: Vec::new(),
            body: None,
        })
    }

    /// Creates a plain `GET` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    /// Creates a top-level navigation request for a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn navigate(url: &str) -> Result<Self> {
        Ok(Self::get(url)?
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document))
    }

    /// Creates a `GET` request for a subresource with the given destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn asset(url: &str, destination: Destination) -> Result<Self> {
        Ok(Self::get(url)?.with_destination(destination))
    }

    /// Creates a `POST` request carrying a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the body cannot be serialized.
    pub fn post_json<T: Serialize>(url: &str, body: &T) -> Result<Self> {
        let body = serde_json::to_vec(body)?;
        Ok(Self::new(Method::Post, url)?
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Sets the request mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the request destination.
    #[must_use]
    pub const fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the URL path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns the first value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Returns the key used to store this request's response in a cache.
    ///
    /// The key is the URL without its fragment.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// Decodes the request body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is missing or is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.body.as_deref().unwrap_or_default();
        Ok(serde_json::from_slice(body)?)
    }
}
