//! Wake sources for sync cycles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pledgekeeper_http::{Fetcher, Request};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Why a sync cycle should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSignal {
    /// Connectivity came back.
    Online,
    /// A background-sync tag fired.
    Tag(String),
    /// Periodic wake.
    Scheduled,
    /// Someone asked for a sync right now.
    Manual,
}

/// Source of sync wake-ups.
pub trait SyncTrigger: Send {
    /// Waits for the next wake-up. `None` means the trigger is closed.
    fn wait(&mut self) -> impl Future<Output = Option<SyncSignal>> + Send;
}

/// Wakes on a fixed period.
#[derive(Debug)]
pub struct IntervalTrigger {
    interval: Interval,
}

impl IntervalTrigger {
    /// Creates a trigger firing every `period`, first after one full period.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl SyncTrigger for IntervalTrigger {
    async fn wait(&mut self) -> Option<SyncSignal> {
        self.interval.tick().await;
        Some(SyncSignal::Scheduled)
    }
}

/// Sending half of a [`ManualTrigger`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncSignal>,
}

impl SyncHandle {
    /// Queues a wake-up. Returns false if the trigger was dropped.
    pub fn fire(&self, signal: SyncSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

/// Wakes whenever a [`SyncHandle`] fires.
#[derive(Debug)]
pub struct ManualTrigger {
    rx: mpsc::UnboundedReceiver<SyncSignal>,
}

impl ManualTrigger {
    /// Creates a trigger and the handle that fires it.
    #[must_use]
    pub fn new() -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, SyncHandle { tx })
    }
}

impl SyncTrigger for ManualTrigger {
    async fn wait(&mut self) -> Option<SyncSignal> {
        self.rx.recv().await
    }
}

/// Probes a health URL and wakes when the network becomes reachable.
///
/// Any HTTP response counts as reachable; only transport failures count as
/// offline. The first successful probe also fires, so records captured
/// before a restart are replayed promptly.
#[derive(Debug)]
pub struct ConnectivityTrigger<F> {
    fetcher: Arc<F>,
    probe_url: String,
    interval: Interval,
    online: Option<bool>,
}

impl<F: Fetcher> ConnectivityTrigger<F> {
    /// Creates a trigger probing `probe_url` every `period`.
    #[must_use]
    pub fn new(fetcher: Arc<F>, probe_url: impl Into<String>, period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            fetcher,
            probe_url: probe_url.into(),
            interval,
            online: None,
        }
    }

    async fn probe(&self) -> bool {
        let Ok(request) = Request::get(&self.probe_url) else {
            return false;
        };
        self.fetcher.fetch(&request).await.is_ok()
    }
}

impl<F: Fetcher> SyncTrigger for ConnectivityTrigger<F> {
    async fn wait(&mut self) -> Option<SyncSignal> {
        loop {
            self.interval.tick().await;
            let now_online = self.probe().await;
            let was_online = self.online.replace(now_online);

            if now_online && was_online != Some(true) {
                info!(url = %self.probe_url, "Network reachable");
                return Some(SyncSignal::Online);
            }
            if !now_online && was_online != Some(false) {
                debug!(url = %self.probe_url, "Network unreachable");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pledgekeeper_http::ScriptedFetcher;

    #[tokio::test]
    async fn test_manual_trigger_delivers_in_order() {
        let (mut trigger, handle) = ManualTrigger::new();
        assert!(handle.fire(SyncSignal::Tag("donation-sync".to_string())));
        assert!(handle.fire(SyncSignal::Manual));

        assert_eq!(
            trigger.wait().await,
            Some(SyncSignal::Tag("donation-sync".to_string()))
        );
        assert_eq!(trigger.wait().await, Some(SyncSignal::Manual));
    }

    #[tokio::test]
    async fn test_manual_trigger_closes_with_handles() {
        let (mut trigger, handle) = ManualTrigger::new();
        drop(handle);
        assert_eq!(trigger.wait().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_trigger_waits_one_period() {
        let mut trigger = IntervalTrigger::new(Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(trigger.wait().await, Some(SyncSignal::Scheduled));
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_fires_on_first_reachable_probe() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let mut trigger = ConnectivityTrigger::new(
            fetcher,
            "https://give.example.org/api/health",
            Duration::from_secs(5),
        );
        assert_eq!(trigger.wait().await, Some(SyncSignal::Online));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_fires_on_reconnect_only() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set_online(false);
        let mut trigger = ConnectivityTrigger::new(
            Arc::clone(&fetcher),
            "https://give.example.org/api/health",
            Duration::from_secs(5),
        );

        let waiting = tokio::time::timeout(Duration::from_secs(30), trigger.wait()).await;
        assert!(waiting.is_err());

        fetcher.set_online(true);
        assert_eq!(trigger.wait().await, Some(SyncSignal::Online));

        let steady = tokio::time::timeout(Duration::from_secs(30), trigger.wait()).await;
        assert!(steady.is_err());
    }
}
