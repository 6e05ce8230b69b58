//! Drain-and-replay of pending offline donations.

use std::sync::Arc;

use chrono::SecondsFormat;
use pledgekeeper_http::{Fetcher, Request, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::notify::{NotificationDispatcher, NotificationSurface, Outcome};
use crate::store::{DonationStatus, DonationStore, OfflineDonationRecord};

/// Counts from one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Records accepted by the server.
    pub processed: usize,
    /// Records rejected as invalid (now `failed`).
    pub rejected: usize,
    /// Records left `pending_online` for the next cycle.
    pub retained: usize,
    /// Records that were no longer pending when their turn came.
    pub skipped: usize,
}

impl SyncReport {
    fn add(&mut self, outcome: ReplayOutcome) {
        match outcome {
            ReplayOutcome::Processed => self.processed += 1,
            ReplayOutcome::Rejected => self.rejected += 1,
            ReplayOutcome::Retained => self.retained += 1,
            ReplayOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// What happened to one record during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Accepted; now `processed`.
    Processed,
    /// Rejected as invalid; now `failed`.
    Rejected,
    /// Transient failure; still `pending_online`.
    Retained,
    /// Not pending; no request was sent.
    Skipped,
}

/// Body sent to the processing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayPayload<'a> {
    id: &'a str,
    amount: Option<f64>,
    #[serde(rename = "type")]
    donation_type: &'a str,
    donor_email: Option<&'a str>,
    created_at: String,
}

impl<'a> ReplayPayload<'a> {
    fn from_record(record: &'a OfflineDonationRecord) -> Self {
        Self {
            id: &record.client_id,
            amount: record.amount,
            donation_type: &record.donation_type,
            donor_email: record.donor_email.as_deref(),
            created_at: record
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Replays pending offline donations against the processing endpoint.
///
/// Delivery is at-least-once: a record is only marked `processed` after the
/// server accepted it, so a crash in between resends it on the next cycle.
/// The server deduplicates on the `Idempotency-Key` header.
#[derive(Debug)]
pub struct SyncCoordinator<F, S> {
    store: DonationStore,
    fetcher: Arc<F>,
    notifier: NotificationDispatcher<S>,
    endpoint: String,
    cycle: Arc<Mutex<()>>,
}

impl<F, S> Clone for SyncCoordinator<F, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            fetcher: Arc::clone(&self.fetcher),
            notifier: self.notifier.clone(),
            endpoint: self.endpoint.clone(),
            cycle: Arc::clone(&self.cycle),
        }
    }
}

impl<F: Fetcher, S: NotificationSurface> SyncCoordinator<F, S> {
    /// Creates a coordinator replaying against the absolute `endpoint` URL.
    #[must_use]
    pub fn new(
        store: DonationStore,
        fetcher: Arc<F>,
        notifier: NotificationDispatcher<S>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            endpoint: endpoint.into(),
            cycle: Arc::new(Mutex::new(())),
        }
    }

    /// Runs one sync cycle.
    ///
    /// Cycles never overlap; a second caller waits for the first to finish
    /// and then sees its status updates. One record's failure never stops
    /// the others.
    ///
    /// # Errors
    ///
    /// Returns an error only if the pending records cannot be read.
    pub async fn run_cycle(&self) -> Result<SyncReport> {
        let _cycle = self.cycle.lock().await;

        let pending = self.store.pending_online().await?;
        if pending.is_empty() {
            debug!("Sync cycle: nothing pending");
            return Ok(SyncReport::default());
        }

        info!(count = pending.len(), "Sync cycle started");
        let mut report = SyncReport::default();
        for record in &pending {
            let outcome = self.replay_locked(record.id).await;
            report.add(outcome);
        }

        info!(
            processed = report.processed,
            rejected = report.rejected,
            retained = report.retained,
            skipped = report.skipped,
            "Sync cycle finished"
        );
        Ok(report)
    }

    /// Replays a single record outside of a full cycle.
    pub async fn replay_one(&self, id: i64) -> ReplayOutcome {
        let _cycle = self.cycle.lock().await;
        self.replay_locked(id).await
    }

    async fn replay_locked(&self, id: i64) -> ReplayOutcome {
        // Re-read: another cycle or a crash-restart may already have moved it.
        let record = match self.store.get_offline(id).await {
            Ok(Some(record)) if record.status == DonationStatus::PendingOnline => record,
            Ok(Some(record)) => {
                debug!(id, status = %record.status, "Skipping record that is no longer pending");
                return ReplayOutcome::Skipped;
            }
            Ok(None) => {
                warn!(id, "Skipping record that no longer exists");
                return ReplayOutcome::Skipped;
            }
            Err(e) => {
                error!(id, error = %e, "Failed to read record for replay");
                return ReplayOutcome::Retained;
            }
        };

        let request = match Request::post_json(&self.endpoint, &ReplayPayload::from_record(&record))
        {
            Ok(request) => request.with_header("Idempotency-Key", record.client_id.clone()),
            Err(e) => {
                error!(id, error = %e, "Failed to build replay request");
                return ReplayOutcome::Retained;
            }
        };

        match self.fetcher.fetch(&request).await {
            Ok(response) if response.is_success() => self.on_accepted(&record).await,
            Ok(response) if is_rejection(&response) => {
                self.on_rejected(&record, &rejection_reason(&response)).await
            }
            Ok(response) => {
                self.on_transient(&record, &format!("server returned {}", response.status))
                    .await
            }
            Err(e) if e.is_network() => self.on_transient(&record, &e.to_string()).await,
            Err(e) => {
                warn!(id, error = %e, "Replay request failed outside the network");
                self.on_transient(&record, &e.to_string()).await
            }
        }
    }

    async fn on_accepted(&self, record: &OfflineDonationRecord) -> ReplayOutcome {
        if let Err(e) = self.store.mark_processed(record.id).await {
            // The server has it; the next cycle resends and the server dedups.
            error!(id = record.id, error = %e, "Replay accepted but status update failed");
            return ReplayOutcome::Retained;
        }

        info!(id = record.id, client_id = %record.client_id, "Offline donation processed");
        self.notifier.dispatch(&Outcome::DonationProcessed {
            client_id: record.client_id.clone(),
            amount: record.amount,
        });
        ReplayOutcome::Processed
    }

    async fn on_rejected(&self, record: &OfflineDonationRecord, reason: &str) -> ReplayOutcome {
        if let Err(e) = self.store.mark_failed(record.id, reason).await {
            error!(id = record.id, error = %e, "Replay rejected but status update failed");
            return ReplayOutcome::Retained;
        }

        warn!(id = record.id, reason, "Offline donation rejected by server");
        self.notifier.dispatch(&Outcome::DonationRejected {
            client_id: record.client_id.clone(),
            amount: record.amount,
            reason: reason.to_string(),
        });
        ReplayOutcome::Rejected
    }

    async fn on_transient(&self, record: &OfflineDonationRecord, reason: &str) -> ReplayOutcome {
        debug!(id = record.id, reason, "Replay failed; will retry next cycle");
        if let Err(e) = self.store.record_attempt(record.id, reason).await {
            error!(id = record.id, error = %e, "Failed to record replay attempt");
        }
        ReplayOutcome::Retained
    }
}

/// The server explicitly rejected the payload as invalid.
const fn is_rejection(response: &Response) -> bool {
    matches!(response.status, 400 | 422)
}

fn rejection_reason(response: &Response) -> String {
    let from_json = response
        .parse_json::<serde_json::Value>()
        .ok()
        .and_then(|body| {
            body.get("error")
                .or_else(|| body.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        });

    from_json.unwrap_or_else(|| {
        let text = response.text();
        if text.trim().is_empty() {
            format!("rejected with status {}", response.status)
        } else {
            text
        }
    })
}
