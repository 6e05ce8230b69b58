//! The explicit dispatcher hosts drive the engine through.
//!
//! A host forwards three kinds of input:
//! - lifecycle events ([`Engine::handle_lifecycle_event`]),
//! - intercepted page requests ([`Engine::handle_intercepted_request`]),
//! - control messages ([`Engine::handle_message`]).
//!
//! All state is owned by the engine; clones share it.

use std::sync::Arc;

use pledgekeeper_http::{Fetcher, Request, Response};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::{Error, Result};
use crate::cache::CacheManager;
use crate::config::EngineConfig;
use crate::control::{ControlMessage, ControlReply};
use crate::intercept::Interceptor;
use crate::lifecycle::{LifecycleEvent, WorkerState};
use crate::notify::{NotificationDispatcher, NotificationSurface};
use crate::store::DonationStore;
use crate::sync::{SyncCoordinator, SyncRegistry, SyncReport};

/// What a lifecycle event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A version was installed and is waiting, or already active.
    Installed {
        /// Installed version.
        version: String,
        /// Whether it was activated right away.
        activated: bool,
    },
    /// The waiting version became active.
    Activated {
        /// Newly active version.
        version: String,
        /// Cache generations that were deleted.
        removed: Vec<String>,
    },
    /// A sync cycle ran.
    Synced(SyncReport),
    /// Nothing to do.
    Ignored,
}

/// Offline donation engine.
#[derive(Debug)]
pub struct Engine<F, S> {
    config: Arc<EngineConfig>,
    cache: CacheManager,
    store: DonationStore,
    fetcher: Arc<F>,
    registry: SyncRegistry,
    interceptor: Interceptor<F, S>,
    coordinator: SyncCoordinator<F, S>,
    notifier: NotificationDispatcher<S>,
    state: Arc<RwLock<WorkerState>>,
    lifecycle: Arc<Mutex<()>>,
}

impl<F, S> Clone for Engine<F, S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            cache: self.cache.clone(),
            store: self.store.clone(),
            fetcher: Arc::clone(&self.fetcher),
            registry: self.registry.clone(),
            interceptor: self.interceptor.clone(),
            coordinator: self.coordinator.clone(),
            notifier: self.notifier.clone(),
            state: Arc::clone(&self.state),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<F: Fetcher, S: NotificationSurface> Engine<F, S> {
    /// Builds an engine with an empty cache and no installed version.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: EngineConfig,
        store: DonationStore,
        fetcher: Arc<F>,
        surface: Arc<S>,
    ) -> Result<Self> {
        config.validate()?;
        let endpoint = config.resolve(&config.processing_endpoint)?;
        let config = Arc::new(config);

        let cache = CacheManager::new();
        let registry = SyncRegistry::new();
        let notifier = NotificationDispatcher::new(surface, config.resume_path.clone());
        let interceptor = Interceptor::new(
            Arc::clone(&config),
            cache.clone(),
            store.clone(),
            Arc::clone(&fetcher),
            notifier.clone(),
            registry.clone(),
        );
        let coordinator = SyncCoordinator::new(
            store.clone(),
            Arc::clone(&fetcher),
            notifier.clone(),
            endpoint,
        );

        Ok(Self {
            config,
            cache,
            store,
            fetcher,
            registry,
            interceptor,
            coordinator,
            notifier,
            state: Arc::new(RwLock::new(WorkerState::new())),
            lifecycle: Arc::new(Mutex::new(())),
        })
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The cache generations.
    #[must_use]
    pub const fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// The durable store.
    #[must_use]
    pub const fn store(&self) -> &DonationStore {
        &self.store
    }

    /// Pending background-sync tags.
    #[must_use]
    pub const fn registry(&self) -> &SyncRegistry {
        &self.registry
    }

    /// The notification dispatcher.
    #[must_use]
    pub const fn notifier(&self) -> &NotificationDispatcher<S> {
        &self.notifier
    }

    /// The active worker version.
    pub async fn active_version(&self) -> Option<String> {
        self.state.read().await.active().map(str::to_string)
    }

    /// The installed version waiting to activate.
    pub async fn waiting_version(&self) -> Option<String> {
        self.state.read().await.waiting().map(str::to_string)
    }

    /// Name of the active cache generation.
    pub async fn active_generation(&self) -> Option<String> {
        self.state
            .read()
            .await
            .active()
            .map(|v| self.config.active_cache_name(v))
    }

    /// Handles a lifecycle event.
    ///
    /// # Errors
    ///
    /// `Install` fails with [`Error::CriticalResource`] when a critical
    /// resource could not be cached; the previously active version keeps
    /// serving. A version whose generation would be the fallback cache is
    /// refused with [`Error::InvalidVersion`]. `Online` and `Sync` fail only if the store cannot be read.
    pub async fn handle_lifecycle_event(&self, event: LifecycleEvent) -> Result<EventOutcome> {
        match event {
            LifecycleEvent::Install { version } => self.install(version).await,
            LifecycleEvent::Activate => {
                let _lifecycle = self.lifecycle.lock().await;
                Ok(self.activate_locked().await)
            }
            LifecycleEvent::Online => Ok(EventOutcome::Synced(self.sync().await?)),
            LifecycleEvent::Sync { tag } => {
                if !self.registry.take(&tag) {
                    warn!(%tag, "Ignoring sync for unregistered tag");
                    return Ok(EventOutcome::Ignored);
                }
                Ok(EventOutcome::Synced(self.sync().await?))
            }
        }
    }

    /// Answers an intercepted page request. Never fails.
    pub async fn handle_intercepted_request(&self, request: Request) -> Response {
        let active = self.active_generation().await;
        self.interceptor.handle(request, active.as_deref()).await
    }

    /// Handles a control message from the hosting page.
    pub async fn handle_message(&self, message: ControlMessage) -> ControlReply {
        match message {
            ControlMessage::SkipActivation => {
                {
                    let _lifecycle = self.lifecycle.lock().await;
                    self.activate_locked().await;
                }
                ControlReply::Activated {
                    version: self.active_generation().await,
                }
            }
            ControlMessage::GetVersion => ControlReply::Version {
                version: self.active_generation().await,
            },
            ControlMessage::ClearCache => {
                let removed = self.cache.clear().await;
                info!(removed, "Cleared all cache generations");
                ControlReply::CacheCleared { removed }
            }
            ControlMessage::SyncNow => match self.sync().await {
                Ok(report) => ControlReply::SyncComplete { report },
                Err(e) => ControlReply::Error {
                    message: e.to_string(),
                },
            },
            ControlMessage::NotificationAction { action } => ControlReply::ActionHandled {
                page: self.notifier.handle_action(action),
            },
        }
    }

    /// Decodes and handles a JSON control message.
    ///
    /// Malformed or unknown messages get an `ERROR` reply.
    pub async fn handle_raw_message(&self, json: &str) -> ControlReply {
        match ControlMessage::parse(json) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!(error = %e, "Rejected control message");
                ControlReply::Error {
                    message: format!("invalid control message: {e}"),
                }
            }
        }
    }

    /// Runs one sync cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending records cannot be read.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.coordinator.run_cycle().await
    }

    async fn install(&self, version: String) -> Result<EventOutcome> {
        let _lifecycle = self.lifecycle.lock().await;
        let name = self.config.active_cache_name(&version);
        if name == self.config.fallback_cache {
            return Err(Error::InvalidVersion(version));
        }
        info!(%version, cache = %name, "Installing");

        let critical = self.resolve_all(&self.config.critical_manifest)?;
        if let Err(e) = self
            .cache
            .populate(&name, &critical, self.fetcher.as_ref())
            .await
        {
            // A generation the active or waiting version still points at stays.
            let in_use = {
                let state = self.state.read().await;
                [state.active(), state.waiting()].contains(&Some(version.as_str()))
            };
            if !in_use {
                self.cache.delete(&name).await;
            }
            warn!(%version, error = %e, "Install failed");
            return Err(e);
        }

        let media = self.resolve_all(&self.config.media_manifest)?;
        self.cache
            .populate_optional(&name, &media, self.fetcher.as_ref())
            .await;

        let offline_page = vec![self.config.resolve(&self.config.offline_page)?];
        if self
            .cache
            .populate_optional(&self.config.fallback_cache, &offline_page, self.fetcher.as_ref())
            .await
            == 0
        {
            warn!(page = %self.config.offline_page, "Offline page not cached");
        }

        self.state.write().await.install(version.clone());
        info!(%version, "Installed; waiting to activate");

        let activated = if self.config.claim_immediately {
            matches!(self.activate_locked().await, EventOutcome::Activated { .. })
        } else {
            false
        };
        Ok(EventOutcome::Installed { version, activated })
    }

    /// Promotes the waiting version. Callers hold the lifecycle lock.
    async fn activate_locked(&self) -> EventOutcome {
        let Some(version) = self.waiting_version().await else {
            return EventOutcome::Ignored;
        };

        let active = self.config.active_cache_name(&version);
        let removed = self
            .cache
            .gc_stale_generations(&[active.as_str(), self.config.fallback_cache.as_str()])
            .await;
        self.state.write().await.promote();

        info!(%version, removed = removed.len(), "Activated");
        EventOutcome::Activated { version, removed }
    }

    fn resolve_all(&self, paths: &[String]) -> Result<Vec<String>> {
        paths.iter().map(|p| self.config.resolve(p)).collect()
    }
}
