//! A [`Fetcher`] that answers from a script instead of the network.
//!
//! Used for dry runs and tests: routes are keyed by method and path, every
//! call is recorded, and the whole fetcher can be switched offline.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::request::{Method, Request};
use crate::response::Response;

/// What a scripted route does when it is hit.
#[derive(Debug, Clone)]
pub enum Route {
    /// Answer with this response.
    Respond(Response),
    /// Fail as if the network were unreachable.
    Fail,
    /// Never resolve.
    Hang,
}

/// Scripted [`Fetcher`].
///
/// Each `(method, path)` holds a queue of routes. A call consumes the front
/// of the queue; the last route is sticky and answers every later call.
/// Unrouted requests get a `404`.
#[derive(Debug)]
pub struct ScriptedFetcher {
    online: AtomicBool,
    routes: Mutex<HashMap<(Method, String), VecDeque<Route>>>,
    calls: Mutex<Vec<Request>>,
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedFetcher {
    /// Creates an online fetcher with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Appends a route for `method` and `path`.
    pub fn route(&self, method: Method, path: &str, route: Route) {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(route);
    }

    /// Appends a `GET` route answering `status` with `body`.
    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.route(
            Method::Get,
            path,
            Route::Respond(Response::new(status, body.to_string())),
        );
    }

    /// Switches the simulated network on or off.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns whether the simulated network is reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns every request seen so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Request> {
        lock(&self.calls).clone()
    }

    /// Counts calls made to `method` and `path`.
    #[must_use]
    pub fn call_count(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|r| r.method == method && r.path() == path)
            .count()
    }

    fn next_route(&self, request: &Request) -> Option<Route> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(&(request.method, request.path().to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        lock(&self.calls).push(request.clone());

        if !self.is_online() {
            return Err(Error::Unreachable(format!("offline: {}", request.url)));
        }

        match self.next_route(request) {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail) => Err(Error::Unreachable(format!(
                "scripted failure: {}",
                request.url
            ))),
            Some(Route::Hang) => std::future::pending().await,
            None => Ok(Response::new(404, "Not Found")),
        }
    }
}
