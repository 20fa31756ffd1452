//! # Log listener: lifecycle events → structured log records.
//!
//! [`spawn_log_listener`] drains the event bus in a background task and
//! emits one `tracing` record per event, at a level matching its severity.
//! Fine-grained request logging happens at the call sites; this listener
//! covers lifecycle transitions only.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Event, EventBus, EventKind};

/// Spawns the background task that logs lifecycle events.
///
/// Runs until the token is cancelled or the bus is closed. Lagged receivers
/// skip ahead silently; losing a log line is preferable to blocking a
/// publisher.
pub fn spawn_log_listener(bus: &EventBus, token: CancellationToken) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => log_event(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        }
    })
}

fn log_event(ev: &Event) {
    let service = ev.service.as_deref().unwrap_or("");
    let script = ev
        .script
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    match ev.kind {
        EventKind::ShutdownRequested => info!(seq = ev.seq, "shutdown requested"),
        EventKind::AllStoppedWithin => info!(seq = ev.seq, "all services stopped within grace"),
        EventKind::GraceExceeded => warn!(seq = ev.seq, "shutdown grace exceeded"),
        EventKind::DiscoveryCompleted => {
            info!(count = ev.count.unwrap_or(0), "discovery completed")
        }
        EventKind::ScriptAdmitted => info!(%service, %script, "script admitted"),
        EventKind::ScriptRemoved => info!(%service, %script, "script removed"),
        EventKind::ScriptRestarted => info!(%service, %script, "script restarted"),
        EventKind::ScriptRejected => warn!(
            %script,
            error = ev.error.as_deref().unwrap_or(""),
            "script rejected"
        ),
        EventKind::ServiceAdded => info!(%service, "service added"),
        EventKind::ServiceRemoved => info!(%service, "service removed"),
        EventKind::ServiceStarting => debug!(
            %service,
            attempt = ev.attempt.unwrap_or(0),
            "service starting"
        ),
        EventKind::ServiceStopped => info!(%service, "service stopped"),
        EventKind::ServiceFailed => warn!(
            %service,
            error = ev.error.as_deref().unwrap_or(""),
            "service failed"
        ),
        EventKind::BackoffScheduled => debug!(
            %service,
            delay = ?ev.delay.unwrap_or_default(),
            attempt = ev.attempt.unwrap_or(0),
            "backoff scheduled"
        ),
        EventKind::ServiceDead => error!(
            %service,
            attempt = ev.attempt.unwrap_or(0),
            error = ev.error.as_deref().unwrap_or(""),
            "service gave up after repeated failures"
        ),
        EventKind::EndpointDropped => warn!(
            %service,
            %script,
            subject = ev.subject.as_deref().unwrap_or(""),
            "duplicate endpoint subject dropped, keeping first"
        ),
        EventKind::DescriptorMismatch => warn!(
            %service,
            %script,
            error = ev.error.as_deref().unwrap_or(""),
            "script service name mismatch, endpoints skipped"
        ),
    }
}
