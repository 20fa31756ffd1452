//! # ServiceActor: per-service supervision loop.
//!
//! Supervises the serve loop of one [`ManagedService`]:
//! - restarts it after failures, with delays from [`BackoffPolicy`],
//! - gives up after [`MAX_SERVE_FAILURES`] consecutive failures,
//! - exits cleanly on cooperative cancellation.
//!
//! ## Event flow
//! ```text
//! loop {
//!   ├─► check cancellation (fast-path)
//!   ├─► attempt += 1
//!   ├─► publish ServiceStarting
//!   ├─► ManagedService::serve()
//!   │      ├─► Ok   — token cancelled, deregistered → ServiceStopped, exit
//!   │      └─► Err  — registration failed → ServiceFailed
//!   ├─► failure budget spent? → ServiceDead, exit
//!   └─► publish BackoffScheduled → sleep (cancellable) → next attempt
//! }
//! ```
//!
//! ## Rules
//! - Serve attempts run **sequentially** within one actor.
//! - The attempt counter is monotonic and never resets.
//! - Transient bus failures are invisible to operators beyond warn logs;
//!   a dead service is an error-level event and stays down until the next
//!   filesystem change reconstitutes it.

use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventBus, EventKind};
use crate::policies::BackoffPolicy;
use crate::service::ManagedService;

/// Consecutive serve failures after which a service is given up.
pub const MAX_SERVE_FAILURES: u32 = 10;

/// Reason a service actor exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorExit {
    /// The actor was cancelled (shutdown or supervisor-driven restart).
    Cancelled,
    /// The failure budget was spent; the service stays down.
    GaveUp,
}

/// Supervises one managed service's serve loop with restart and backoff.
pub struct ServiceActor {
    service: Arc<ManagedService>,
    client: async_nats::Client,
    events: EventBus,
    backoff: BackoffPolicy,
    max_failures: u32,
}

impl ServiceActor {
    /// Creates an actor for `service` using the shared bus client.
    pub fn new(
        service: Arc<ManagedService>,
        client: async_nats::Client,
        events: EventBus,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            service,
            client,
            events,
            backoff,
            max_failures: MAX_SERVE_FAILURES,
        }
    }

    /// Runs until cancellation or until the failure budget is spent.
    pub async fn run(self, token: CancellationToken) -> ActorExit {
        let name = self.service.name().to_string();
        let mut prev_delay = None;
        let mut failures: u32 = 0;
        let mut attempt: u64 = 0;

        loop {
            if token.is_cancelled() {
                return ActorExit::Cancelled;
            }

            attempt += 1;
            self.events.publish(
                Event::now(EventKind::ServiceStarting)
                    .with_service(&name)
                    .with_attempt(attempt),
            );

            match self.service.serve(&self.client, &token).await {
                Ok(()) => {
                    self.events
                        .publish(Event::now(EventKind::ServiceStopped).with_service(&name));
                    return ActorExit::Cancelled;
                }
                Err(e) => {
                    failures += 1;
                    self.events.publish(
                        Event::now(EventKind::ServiceFailed)
                            .with_service(&name)
                            .with_attempt(attempt)
                            .with_error(e.to_string()),
                    );

                    if failures >= self.max_failures {
                        self.events.publish(
                            Event::now(EventKind::ServiceDead)
                                .with_service(&name)
                                .with_attempt(attempt)
                                .with_error(e.to_string()),
                        );
                        return ActorExit::GaveUp;
                    }

                    let delay = self.backoff.next(prev_delay);
                    prev_delay = Some(delay);
                    self.events.publish(
                        Event::now(EventKind::BackoffScheduled)
                            .with_service(&name)
                            .with_attempt(attempt)
                            .with_delay(delay),
                    );

                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = token.cancelled() => return ActorExit::Cancelled,
                    }
                }
            }
        }
    }
}
