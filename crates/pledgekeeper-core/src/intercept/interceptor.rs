//! Routing policy for intercepted requests.

use std::sync::Arc;

use pledgekeeper_http::{Fetcher, Request, Response};
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::classify::{RequestClass, classify};
use crate::cache::CacheManager;
use crate::config::EngineConfig;
use crate::notify::{NotificationDispatcher, NotificationSurface, Outcome};
use crate::store::{DonationStore, NewDonationIntent, NewOfflineDonation};
use crate::sync::SyncRegistry;

/// Applies the caching and capture strategy for each request class.
#[derive(Debug)]
pub struct Interceptor<F, S> {
    config: Arc<EngineConfig>,
    cache: CacheManager,
    store: DonationStore,
    fetcher: Arc<F>,
    notifier: NotificationDispatcher<S>,
    registry: SyncRegistry,
}

impl<F, S> Clone for Interceptor<F, S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            cache: self.cache.clone(),
            store: self.store.clone(),
            fetcher: Arc::clone(&self.fetcher),
            notifier: self.notifier.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<F: Fetcher, S: NotificationSurface> Interceptor<F, S> {
    /// Creates an interceptor over shared engine parts.
    #[must_use]
    pub const fn new(
        config: Arc<EngineConfig>,
        cache: CacheManager,
        store: DonationStore,
        fetcher: Arc<F>,
        notifier: NotificationDispatcher<S>,
        registry: SyncRegistry,
    ) -> Self {
        Self {
            config,
            cache,
            store,
            fetcher,
            notifier,
            registry,
        }
    }

    /// Produces the response for `request`.
    ///
    /// `active` names the active cache generation, if a version has been
    /// activated. Never fails: every error path ends in a concrete response.
    pub async fn handle(&self, request: Request, active: Option<&str>) -> Response {
        let class = classify(&request, &self.config.donation_submit_path);
        debug!(method = %request.method, path = request.path(), ?class, "Intercepted request");

        match class {
            RequestClass::DonationSubmit => self.capture_donation(&request).await,
            RequestClass::Navigation => self.navigate(&request, active).await,
            RequestClass::StaticAsset => self.static_asset(request, active).await,
            RequestClass::Other => self.other(&request).await,
            RequestClass::Passthrough => self.network_or_unavailable(&request).await,
        }
    }

    async fn capture_donation(&self, request: &Request) -> Response {
        let body = request.body.as_deref().unwrap_or_default();
        let donation = NewOfflineDonation::from_payload(body);

        let record = match self.store.enqueue_offline(&donation).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Failed to persist offline donation");
                return json_response(
                    500,
                    &json!({
                        "success": false,
                        "error": "Could not save your donation offline. Please try again.",
                    }),
                );
            }
        };

        info!(client_id = %record.client_id, "Offline donation captured");
        self.registry.register(&self.config.sync_tag);
        self.notifier.dispatch(&Outcome::DonationQueued {
            client_id: record.client_id.clone(),
            amount: record.amount,
        });

        json_response(
            202,
            &json!({
                "success": true,
                "id": record.client_id,
                "status": record.status,
                "message": "Donation saved offline. It will be submitted when you're back online.",
            }),
        )
    }

    async fn navigate(&self, request: &Request, active: Option<&str>) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let Some(name) = active {
                    self.cache.put(name, &request.cache_key(), &response).await;
                }
                return response;
            }
            Err(e) => debug!(path = request.path(), error = %e, "Navigation network failure"),
        }

        if request.path() == self.config.donation_start_path {
            self.capture_intent(request).await;
        }

        let key = request.cache_key();
        if let Some(name) = active
            && let Some(cached) = self.cache.lookup(name, &key).await
        {
            return cached.to_response();
        }

        self.offline_page().await
    }

    async fn capture_intent(&self, request: &Request) {
        let intent = NewDonationIntent {
            source_url: request.url.to_string(),
            amount: request
                .query_param("amount")
                .and_then(|a| a.trim().parse::<f64>().ok()),
            recurring: request
                .query_param("recurring")
                .is_some_and(|r| matches!(r.as_str(), "true" | "1" | "on" | "yes")),
        };

        match self.store.record_intent(&intent).await {
            Ok(intent) => {
                info!(id = %intent.id, "Donation intent captured");
                self.notifier.dispatch(&Outcome::IntentCaptured {
                    intent_id: intent.id,
                    amount: intent.amount,
                });
            }
            Err(e) => warn!(error = %e, "Failed to record donation intent"),
        }
    }

    async fn offline_page(&self) -> Response {
        let key = match self
            .config
            .resolve(&self.config.offline_page)
            .and_then(|url| Ok(Request::get(&url)?.cache_key()))
        {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Offline page URL is invalid");
                return Response::service_unavailable();
            }
        };

        self.cache
            .lookup(&self.config.fallback_cache, &key)
            .await
            .map_or_else(Response::service_unavailable, |cached| cached.to_response())
    }

    async fn static_asset(&self, request: Request, active: Option<&str>) -> Response {
        let key = request.cache_key();

        if let Some(name) = active {
            if let Some(cached) = self.cache.lookup(name, &key).await {
                self.revalidate(request, name.to_string(), key);
                return cached.to_response();
            }
        } else if let Some(cached) = self.cache.lookup_any(&key).await {
            return cached.to_response();
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if let Some(name) = active {
                    self.cache.put(name, &key, &response).await;
                }
                response
            }
            Err(e) => {
                debug!(path = request.path(), error = %e, "Static asset unavailable");
                Response::service_unavailable()
            }
        }
    }

    /// Refreshes a cached entry without holding up the response.
    fn revalidate(&self, request: Request, name: String, key: String) {
        let cache = self.cache.clone();
        let fetcher = Arc::clone(&self.fetcher);

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) => {
                    if cache.put(&name, &key, &response).await {
                        debug!(%key, "Revalidated cached asset");
                    }
                }
                Err(e) => debug!(%key, error = %e, "Revalidation skipped"),
            }
        });
    }

    async fn other(&self, request: &Request) -> Response {
        if let Some(cached) = self.cache.lookup_any(&request.cache_key()).await {
            return cached.to_response();
        }
        self.network_or_unavailable(request).await
    }

    async fn network_or_unavailable(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(method = %request.method, path = request.path(), error = %e, "Network failure");
                Response::service_unavailable()
            }
        }
    }
}

fn json_response(status: u16, body: &serde_json::Value) -> Response {
    Response::json(status, body).unwrap_or_else(|_| Response::new(status, body.to_string()))
}
