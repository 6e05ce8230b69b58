//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Configuration for the donation engine.
///
/// Every field has a default, so a partial JSON file only needs to name what
/// it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Origin all paths are resolved against.
    pub origin: String,
    /// Worker version; qualifies the active cache generation name.
    pub version: String,
    /// Prefix of active cache generation names.
    pub cache_prefix: String,
    /// Name of the version-independent fallback generation.
    pub fallback_cache: String,
    /// Path of the offline-experience page.
    pub offline_page: String,
    /// Resources that must all be cached for installation to succeed.
    pub critical_manifest: Vec<String>,
    /// Resources cached on a best-effort basis.
    pub media_manifest: Vec<String>,
    /// Path that offline donation forms are posted to.
    pub donation_submit_path: String,
    /// Navigation path that starts a donation.
    pub donation_start_path: String,
    /// Processing endpoint offline donations are replayed against.
    pub processing_endpoint: String,
    /// Page the `complete` notification action navigates to.
    pub resume_path: String,
    /// Background-sync tag registered after a capture.
    pub sync_tag: String,
    /// Path probed to detect that connectivity is back.
    pub health_path: String,
    /// Seconds between scheduled sync wakes.
    pub poll_interval_secs: u64,
    /// Seconds between connectivity probes.
    pub probe_interval_secs: u64,
    /// Seconds before a network request counts as failed.
    pub fetch_timeout_secs: u64,
    /// `SQLite` database file; `None` uses the platform data directory.
    pub database_path: Option<String>,
    /// Activate a freshly installed version without waiting for clients.
    pub claim_immediately: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            version: "v1".to_string(),
            cache_prefix: "pledgekeeper".to_string(),
            fallback_cache: "pledgekeeper-fallback".to_string(),
            offline_page: "/offline.html".to_string(),
            critical_manifest: vec![
                "/".to_string(),
                "/donate".to_string(),
                "/static/app.css".to_string(),
                "/static/app.js".to_string(),
            ],
            media_manifest: vec!["/static/logo.png".to_string()],
            donation_submit_path: "/api/donations/offline".to_string(),
            donation_start_path: "/donate".to_string(),
            processing_endpoint: "/api/donations/process-offline".to_string(),
            resume_path: "/donate/resume".to_string(),
            sync_tag: "donation-sync".to_string(),
            health_path: "/api/health".to_string(),
            poll_interval_secs: 60,
            probe_interval_secs: 10,
            fetch_timeout_secs: 15,
            database_path: None,
            claim_immediately: true,
        }
    }
}

impl EngineConfig {
    /// Name of the active cache generation for `version`.
    #[must_use]
    pub fn active_cache_name(&self, version: &str) -> String {
        format!("{}-{version}", self.cache_prefix)
    }

    /// Resolves a path (or absolute URL) against the origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin or the joined URL is invalid.
    pub fn resolve(&self, path: &str) -> Result<String> {
        let origin = Url::parse(&self.origin)?;
        Ok(origin.join(path)?.into())
    }

    /// Interval between scheduled sync wakes.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Interval between connectivity probes.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Network request timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.origin)
            .map_err(|e| Error::Config(format!("invalid origin {:?}: {e}", self.origin)))?;

        if self.version.trim().is_empty() {
            return Err(Error::Config("version must not be empty".to_string()));
        }
        if self.active_cache_name(&self.version) == self.fallback_cache {
            return Err(Error::Config(
                "fallback cache name collides with the active generation".to_string(),
            ));
        }
        for path in [
            &self.offline_page,
            &self.donation_submit_path,
            &self.donation_start_path,
            &self.processing_endpoint,
        ] {
            if !path.starts_with('/') {
                return Err(Error::Config(format!("path {path:?} must start with '/'")));
            }
        }
        if self.poll_interval_secs == 0 || self.probe_interval_secs == 0 {
            return Err(Error::Config(
                "pollIntervalSecs and probeIntervalSecs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
