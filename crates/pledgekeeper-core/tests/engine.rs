//! End-to-end tests driving the engine the way a host does.
//!
//! The network is a scripted fetcher and notifications go to an in-memory
//! surface, so every scenario runs without a server or a desktop session.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pledgekeeper_core::{
    ControlMessage, ControlReply, DonationStatus, DonationStore, Engine, EngineConfig, Error,
    EventOutcome, LifecycleEvent, RecordingSurface, generate_id,
};
use pledgekeeper_http::{
    Destination, Fetcher, Method, Request, Response, Route, ScriptedFetcher,
};
use serde_json::json;
use tokio::sync::{Notify, Semaphore};

const ORIGIN: &str = "https://give.example.org";
const PROCESS: &str = "/api/donations/process-offline";

type TestEngine = Engine<ScriptedFetcher, RecordingSurface>;

fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

fn config() -> EngineConfig {
    EngineConfig {
        origin: ORIGIN.to_string(),
        critical_manifest: vec![
            "/".to_string(),
            "/donate".to_string(),
            "/static/app.css".to_string(),
            "/static/app.js".to_string(),
        ],
        media_manifest: vec!["/static/logo.png".to_string()],
        ..EngineConfig::default()
    }
}

/// A fetcher that serves every manifest entry and the offline page.
fn site() -> Arc<ScriptedFetcher> {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond("/", 200, "<h1>Home</h1>");
    fetcher.respond("/donate", 200, "<form>donate</form>");
    fetcher.respond("/static/app.css", 200, "body {}");
    fetcher.respond("/static/app.js", 200, "console.log(1)");
    fetcher.respond("/static/logo.png", 200, "PNG");
    fetcher.respond("/offline.html", 200, "<h1>You are offline</h1>");
    fetcher
}

async fn build(config: EngineConfig, fetcher: &Arc<ScriptedFetcher>) -> TestEngine {
    let store = DonationStore::in_memory().await.unwrap();
    Engine::new(
        config,
        store,
        Arc::clone(fetcher),
        Arc::new(RecordingSurface::new()),
    )
    .unwrap()
}

fn install(version: &str) -> LifecycleEvent {
    LifecycleEvent::Install {
        version: version.to_string(),
    }
}

fn submit(body: &serde_json::Value) -> Request {
    Request::post_json(&url("/api/donations/offline"), body).unwrap()
}

#[tokio::test]
async fn scenario_offline_submission_is_replayed_on_reconnect() {
    let fetcher = site();
    let engine = build(config(), &fetcher).await;
    engine.handle_lifecycle_event(install("v1")).await.unwrap();

    fetcher.set_online(false);
    let response = engine
        .handle_intercepted_request(submit(
            &json!({"amount": 25, "type": "one_time", "donorEmail": "a@b.com"}),
        ))
        .await;
    assert_eq!(response.status, 202);

    let pending = engine.store().pending_online().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, Some(25.0));

    fetcher.set_online(true);
    fetcher.route(
        Method::Post,
        PROCESS,
        Route::Respond(Response::new(200, r#"{"success":true}"#)),
    );
    let shown_before = engine.notifier().surface().count();
    let outcome = engine
        .handle_lifecycle_event(LifecycleEvent::Online)
        .await
        .unwrap();

    let EventOutcome::Synced(report) = outcome else {
        panic!("expected a sync, got {outcome:?}");
    };
    assert_eq!(report.processed, 1);

    let record = engine
        .store()
        .get_offline(pending[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, DonationStatus::Processed);

    let shown = engine.notifier().surface().shown();
    assert_eq!(shown.len(), shown_before + 1);
    assert!(shown.last().unwrap().body.contains("25.00"));
}

#[tokio::test]
async fn scenario_offline_navigation_without_cache() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.set_online(false);
    let engine = build(config(), &fetcher).await;

    let response = engine
        .handle_intercepted_request(Request::navigate(&url("/donate")).unwrap())
        .await;
    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn scenario_offline_navigation_serves_offline_page() {
    let fetcher = site();
    let engine = build(config(), &fetcher).await;
    engine.handle_lifecycle_event(install("v1")).await.unwrap();
    engine.cache().clear().await;
    engine.cache().open("pledgekeeper-fallback").await;
    engine
        .cache()
        .put(
            "pledgekeeper-fallback",
            &url("/offline.html"),
            &Response::html(200, "<h1>You are offline</h1>"),
        )
        .await;

    fetcher.set_online(false);
    let response = engine
        .handle_intercepted_request(Request::navigate(&url("/donate")).unwrap())
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "<h1>You are offline</h1>");
}

#[tokio::test]
async fn scenario_failed_install_keeps_prior_version() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond("/a", 200, "a");
    fetcher.respond("/b", 200, "b");
    // Second fetch of /b onwards fails.
    fetcher.route(Method::Get, "/b", Route::Fail);
    let engine = build(
        EngineConfig {
            critical_manifest: vec!["/a".to_string(), "/b".to_string()],
            media_manifest: Vec::new(),
            ..config()
        },
        &fetcher,
    )
    .await;
    engine.handle_lifecycle_event(install("v1")).await.unwrap();

    let err = engine.handle_lifecycle_event(install("v2")).await.unwrap_err();

    assert!(matches!(err, Error::CriticalResource { ref key, .. } if key.ends_with("/b")));
    assert_eq!(engine.active_version().await.as_deref(), Some("v1"));
    assert_eq!(engine.waiting_version().await, None);
    assert!(!engine.cache().has("pledgekeeper-v2").await);
    assert_eq!(engine.cache().len("pledgekeeper-v1").await, 2);
}

#[tokio::test]
async fn failed_reinstall_of_waiting_version_keeps_its_cache() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond("/a", 200, "a");
    fetcher.respond("/offline.html", 200, "offline");
    let engine = build(
        EngineConfig {
            critical_manifest: vec!["/a".to_string()],
            media_manifest: Vec::new(),
            claim_immediately: false,
            ..config()
        },
        &fetcher,
    )
    .await;

    engine.handle_lifecycle_event(install("v1")).await.unwrap();
    engine.handle_message(ControlMessage::SkipActivation).await;
    engine.handle_lifecycle_event(install("v2")).await.unwrap();
    assert_eq!(engine.waiting_version().await.as_deref(), Some("v2"));

    fetcher.set_online(false);
    assert!(engine.handle_lifecycle_event(install("v2")).await.is_err());
    assert_eq!(engine.waiting_version().await.as_deref(), Some("v2"));
    assert_eq!(engine.cache().len("pledgekeeper-v2").await, 1);

    engine.handle_message(ControlMessage::SkipActivation).await;
    assert_eq!(engine.active_version().await.as_deref(), Some("v2"));
    assert_eq!(
        engine.cache().generation_names().await,
        vec!["pledgekeeper-fallback", "pledgekeeper-v2"]
    );

    let response = engine
        .handle_intercepted_request(Request::navigate(&url("/a")).unwrap())
        .await;
    assert_eq!(response.text(), "a");
}

/// Holds back fetches of one path until the test lets them through.
struct GatedFetcher {
    inner: ScriptedFetcher,
    path: &'static str,
    armed: AtomicBool,
    entered: Notify,
    gate: Semaphore,
}

impl GatedFetcher {
    fn new(inner: ScriptedFetcher, path: &'static str) -> Self {
        Self {
            inner,
            path,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }
}

impl Fetcher for GatedFetcher {
    async fn fetch(&self, request: &Request) -> pledgekeeper_http::Result<Response> {
        if self.armed.load(Ordering::SeqCst) && request.path() == self.path {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await.unwrap();
        }
        self.inner.fetch(request).await
    }
}

#[tokio::test]
async fn late_revalidation_does_not_revive_old_generation() {
    let inner = ScriptedFetcher::new();
    inner.respond("/a", 200, "a");
    inner.respond("/static/app.js", 200, "console.log(1)");
    inner.respond("/offline.html", 200, "offline");
    let fetcher = Arc::new(GatedFetcher::new(inner, "/static/app.js"));
    let engine = Engine::new(
        EngineConfig {
            critical_manifest: vec!["/a".to_string(), "/static/app.js".to_string()],
            media_manifest: Vec::new(),
            ..config()
        },
        DonationStore::in_memory().await.unwrap(),
        Arc::clone(&fetcher),
        Arc::new(RecordingSurface::new()),
    )
    .unwrap();
    engine.handle_lifecycle_event(install("v1")).await.unwrap();

    fetcher.armed.store(true, Ordering::SeqCst);
    let request = Request::asset(&url("/static/app.js"), Destination::Script).unwrap();
    let response = engine.handle_intercepted_request(request).await;
    assert_eq!(response.status, 200);
    fetcher.entered.notified().await;
    fetcher.armed.store(false, Ordering::SeqCst);

    engine.handle_lifecycle_event(install("v2")).await.unwrap();
    let expected = vec!["pledgekeeper-fallback", "pledgekeeper-v2"];
    assert_eq!(engine.cache().generation_names().await, expected);

    fetcher.gate.add_permits(1);
    while fetcher.inner.call_count(Method::Get, "/static/app.js") < 3 {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.cache().generation_names().await, expected);
}

#[tokio::test]
async fn scenario_failed_first_install_leaves_nothing_active() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond("/a", 200, "a");
    fetcher.respond("/b", 500, "");
    let engine = build(
        EngineConfig {
            critical_manifest: vec!["/a".to_string(), "/b".to_string()],
            ..config()
        },
        &fetcher,
    )
    .await;

    assert!(engine.handle_lifecycle_event(install("v1")).await.is_err());
    assert_eq!(engine.active_version().await, None);
    assert!(engine.cache().generation_names().await.is_empty());
}

#[tokio::test]
async fn scenario_rejected_donation_is_never_retried() {
    let fetcher = site();
    let engine = build(config(), &fetcher).await;

    let first = engine
        .handle_intercepted_request(submit(&json!({"amount": 10, "donorEmail": "a@b.com"})))
        .await;
    let second = engine
        .handle_intercepted_request(submit(&json!({"amount": 20, "donorEmail": "not-an-email"})))
        .await;
    assert_eq!(first.status, 202);
    assert_eq!(second.status, 202);

    fetcher.route(Method::Post, PROCESS, Route::Respond(Response::new(200, "{}")));
    fetcher.route(
        Method::Post,
        PROCESS,
        Route::Respond(Response::new(422, r#"{"error":"invalid donor email"}"#)),
    );

    let report = engine.sync().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.rejected, 1);

    let records = engine.store().list_offline().await.unwrap();
    assert_eq!(records[0].status, DonationStatus::Processed);
    assert_eq!(records[1].status, DonationStatus::Failed);
    assert_eq!(records[1].last_error.as_deref(), Some("invalid donor email"));

    for _ in 0..3 {
        let report = engine.sync().await.unwrap();
        assert_eq!(report.processed + report.rejected + report.retained, 0);
    }
    assert_eq!(fetcher.call_count(Method::Post, PROCESS), 2);
}

#[tokio::test]
async fn static_asset_hit_returns_while_network_hangs() {
    let fetcher = site();
    let engine = build(config(), &fetcher).await;
    engine.handle_lifecycle_event(install("v1")).await.unwrap();

    fetcher.route(Method::Get, "/static/app.css", Route::Hang);
    let request = Request::asset(&url("/static/app.css"), Destination::Style).unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(1),
        engine.handle_intercepted_request(request),
    )
    .await
    .expect("cached asset must not wait for the network");

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "body {}");
}

#[tokio::test]
async fn submission_survives_restart_without_replay() {
    let path = std::env::temp_dir().join(format!("{}.db", generate_id("pledgekeeper-test")));
    let path = path.to_string_lossy().into_owned();

    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.set_online(false);
    {
        let store = DonationStore::new(&path).await.unwrap();
        let engine = Engine::new(
            config(),
            store,
            Arc::clone(&fetcher),
            Arc::new(RecordingSurface::new()),
        )
        .unwrap();
        let response = engine
            .handle_intercepted_request(submit(&json!({"amount": 5})))
            .await;
        assert_eq!(response.status, 202);
    }

    let reopened = DonationStore::new(&path).await.unwrap();
    let pending = reopened.pending_online().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].amount, Some(5.0));
    assert_eq!(fetcher.call_count(Method::Post, PROCESS), 0);

    drop(reopened);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn processed_record_makes_no_second_call() {
    let fetcher = site();
    fetcher.route(Method::Post, PROCESS, Route::Respond(Response::new(201, "{}")));
    let engine = build(config(), &fetcher).await;

    engine
        .handle_intercepted_request(submit(&json!({"amount": 15})))
        .await;
    engine.sync().await.unwrap();
    engine
        .handle_lifecycle_event(LifecycleEvent::Online)
        .await
        .unwrap();
    engine.handle_message(ControlMessage::SyncNow).await;

    assert_eq!(fetcher.call_count(Method::Post, PROCESS), 1);
}

#[tokio::test]
async fn background_sync_tag_fires_once() {
    let fetcher = site();
    fetcher.route(Method::Post, PROCESS, Route::Respond(Response::new(200, "{}")));
    let engine = build(config(), &fetcher).await;

    engine
        .handle_intercepted_request(submit(&json!({"amount": 15})))
        .await;
    assert!(engine.registry().is_pending("donation-sync"));

    let tag = LifecycleEvent::Sync {
        tag: "donation-sync".to_string(),
    };
    let first = engine.handle_lifecycle_event(tag.clone()).await.unwrap();
    assert!(matches!(first, EventOutcome::Synced(report) if report.processed == 1));

    let second = engine.handle_lifecycle_event(tag).await.unwrap();
    assert_eq!(second, EventOutcome::Ignored);
}

#[tokio::test]
async fn control_channel_version_and_clear() {
    let fetcher = site();
    let engine = build(config(), &fetcher).await;

    assert_eq!(
        engine.handle_message(ControlMessage::GetVersion).await,
        ControlReply::Version { version: None }
    );

    engine.handle_lifecycle_event(install("v3")).await.unwrap();
    let reply = engine.handle_raw_message(r#"{"type":"GET_VERSION"}"#).await;
    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({"type": "VERSION", "version": "pledgekeeper-v3"})
    );

    let reply = engine.handle_raw_message(r#"{"type":"CLEAR_CACHE"}"#).await;
    assert_eq!(reply, ControlReply::CacheCleared { removed: 2 });

    fetcher.set_online(false);
    let response = engine
        .handle_intercepted_request(Request::navigate(&url("/")).unwrap())
        .await;
    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn concurrent_submissions_are_all_kept() {
    let fetcher = site();
    fetcher.set_online(false);
    let engine = build(config(), &fetcher).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .handle_intercepted_request(submit(&json!({ "amount": i })))
                .await
                .status
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 202);
    }

    let counts = engine.store().count_by_status().await.unwrap();
    assert_eq!(counts.pending_online, 20);
}
