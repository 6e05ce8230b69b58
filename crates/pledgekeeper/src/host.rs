//! Long-running host: lifecycle, sync triggers and the stdin control channel.

use std::sync::Arc;

use pledgekeeper_core::{
    ConnectivityTrigger, ControlReply, Engine, EventOutcome, IntervalTrigger, LifecycleEvent,
    ManualTrigger, NotificationSurface, SyncSignal, SyncTrigger,
};
use pledgekeeper_http::Fetcher;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Installs the configured version, then serves until stdin closes and
/// Ctrl-C arrives.
///
/// Each stdin line is one JSON control message; each reply is written to
/// stdout as one JSON line.
pub async fn run<F: Fetcher, S: NotificationSurface>(
    engine: Engine<F, S>,
    fetcher: Arc<F>,
) -> anyhow::Result<()> {
    let version = engine.config().version.clone();
    match engine
        .handle_lifecycle_event(LifecycleEvent::Install { version })
        .await
    {
        Ok(outcome) => info!(?outcome, "Install finished"),
        Err(e) => error!(error = %e, "Install failed; capturing without a fresh cache"),
    }

    let (mut manual, handle) = ManualTrigger::new();
    engine.registry().attach(handle);
    let mut scheduled = IntervalTrigger::new(engine.config().poll_interval());
    let mut connectivity = ConnectivityTrigger::new(
        fetcher,
        engine.config().resolve(&engine.config().health_path)?,
        engine.config().probe_interval(),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("Host running; send control messages on stdin, Ctrl-C to stop");
    loop {
        tokio::select! {
            Some(signal) = manual.wait() => spawn_sync(&engine, signal),
            Some(signal) = scheduled.wait() => spawn_sync(&engine, signal),
            Some(signal) = connectivity.wait() => spawn_sync(&engine, signal),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let reply = engine.handle_raw_message(&line).await;
                    print_reply(&reply);
                }
                Ok(None) => {
                    debug!("stdin closed; control channel off");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read control message");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Runs the matching lifecycle event without blocking the loop.
fn spawn_sync<F: Fetcher, S: NotificationSurface>(engine: &Engine<F, S>, signal: SyncSignal) {
    let engine = engine.clone();
    tokio::spawn(async move {
        debug!(?signal, "Sync wake");
        let result = match signal {
            SyncSignal::Tag(tag) => engine.handle_lifecycle_event(LifecycleEvent::Sync { tag }).await,
            SyncSignal::Online => engine.handle_lifecycle_event(LifecycleEvent::Online).await,
            SyncSignal::Scheduled | SyncSignal::Manual => {
                engine.sync().await.map(EventOutcome::Synced)
            }
        };
        match result {
            Ok(EventOutcome::Synced(report)) if report.processed + report.rejected > 0 => {
                info!(?report, "Sync wake finished");
            }
            Ok(outcome) => debug!(?outcome, "Sync wake finished"),
            Err(e) => error!(error = %e, "Sync failed"),
        }
    });
}

fn print_reply(reply: &ControlReply) {
    match serde_json::to_string(reply) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "Failed to encode control reply"),
    }
}
