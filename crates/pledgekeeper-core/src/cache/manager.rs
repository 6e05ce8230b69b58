//! Cache generation manager.

use std::collections::BTreeMap;
use std::sync::Arc;

use pledgekeeper_http::{Fetcher, Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::CachedResponse;
use crate::{Error, Result};

type Generation = BTreeMap<String, CachedResponse>;

/// Owner of every cache generation.
///
/// Cloning is cheap and every clone sees the same generations. Writes are
/// last-write-wins per key.
#[derive(Debug, Clone, Default)]
pub struct CacheManager {
    generations: Arc<RwLock<BTreeMap<String, Generation>>>,
}

impl CacheManager {
    /// Create a manager with no generations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named generation if it does not exist yet.
    pub async fn open(&self, name: &str) {
        self.generations
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Check whether a generation exists.
    pub async fn has(&self, name: &str) -> bool {
        self.generations.read().await.contains_key(name)
    }

    /// Names of all generations, sorted.
    pub async fn generation_names(&self) -> Vec<String> {
        self.generations.read().await.keys().cloned().collect()
    }

    /// Number of entries in a generation (zero if it does not exist).
    pub async fn len(&self, name: &str) -> usize {
        self.generations
            .read()
            .await
            .get(name)
            .map_or(0, BTreeMap::len)
    }

    /// Look up a key in one generation. Never touches the network.
    pub async fn lookup(&self, name: &str, key: &str) -> Option<CachedResponse> {
        self.generations.read().await.get(name)?.get(key).cloned()
    }

    /// Look up a key in every generation, returning the first hit.
    pub async fn lookup_any(&self, key: &str) -> Option<CachedResponse> {
        self.generations
            .read()
            .await
            .values()
            .find_map(|generation| generation.get(key).cloned())
    }

    /// Store a response, overwriting any previous entry for the key.
    ///
    /// Only writes into a generation that already exists: a write racing a
    /// generation's deletion is dropped. Non-success responses are never
    /// cached. Returns whether the entry was written.
    pub async fn put(&self, name: &str, key: &str, response: &Response) -> bool {
        if !response.is_success() {
            debug!(cache = name, key, status = response.status, "Not caching non-success response");
            return false;
        }

        let mut generations = self.generations.write().await;
        let Some(generation) = generations.get_mut(name) else {
            debug!(cache = name, key, "Not caching into a missing generation");
            return false;
        };
        generation.insert(key.to_string(), CachedResponse::from_response(response));
        true
    }

    /// Fetch every URL and store it in the generation, all or nothing.
    ///
    /// Nothing is written unless every fetch returned a success status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CriticalResource`] naming the first resource that failed.
    pub async fn populate<F: Fetcher>(
        &self,
        name: &str,
        urls: &[String],
        fetcher: &F,
    ) -> Result<usize> {
        let mut staged = Vec::with_capacity(urls.len());

        for url in urls {
            let request = Request::get(url)?;
            let key = request.cache_key();
            let response = fetcher
                .fetch(&request)
                .await
                .map_err(|e| Error::CriticalResource {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            if !response.is_success() {
                return Err(Error::CriticalResource {
                    key,
                    reason: format!("status {}", response.status),
                });
            }
            staged.push((key, CachedResponse::from_response(&response)));
        }

        let count = staged.len();
        self.generations
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .extend(staged);

        info!(cache = name, count, "Populated cache generation");
        Ok(count)
    }

    /// Fetch and store each URL on a best-effort basis.
    ///
    /// Opens the generation first. Failures are logged and skipped. Returns
    /// how many entries were stored.
    pub async fn populate_optional<F: Fetcher>(
        &self,
        name: &str,
        urls: &[String],
        fetcher: &F,
    ) -> usize {
        self.open(name).await;
        let mut count = 0;

        for url in urls {
            let request = match Request::get(url) {
                Ok(request) => request,
                Err(e) => {
                    warn!(%url, error = %e, "Skipping invalid optional resource");
                    continue;
                }
            };
            match fetcher.fetch(&request).await {
                Ok(response) => {
                    if self.put(name, &request.cache_key(), &response).await {
                        count += 1;
                    } else {
                        warn!(%url, status = response.status, "Optional resource not cached");
                    }
                }
                Err(e) => warn!(%url, error = %e, "Optional resource fetch failed"),
            }
        }

        count
    }

    /// Delete every generation not named in `keep`. Returns the deleted names.
    pub async fn gc_stale_generations(&self, keep: &[&str]) -> Vec<String> {
        let mut generations = self.generations.write().await;
        let stale: Vec<String> = generations
            .keys()
            .filter(|name| !keep.contains(&name.as_str()))
            .cloned()
            .collect();

        for name in &stale {
            generations.remove(name);
            info!(cache = %name, "Deleted stale cache generation");
        }
        stale
    }

    /// Delete one generation. Returns false if it did not exist.
    pub async fn delete(&self, name: &str) -> bool {
        self.generations.write().await.remove(name).is_some()
    }

    /// Delete every generation. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut generations = self.generations.write().await;
        let removed = generations.len();
        generations.clear();
        removed
    }
}
