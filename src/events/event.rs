//! # Lifecycle events emitted by the supervisor, services, and actors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Shutdown events**: the daemon's termination phases
//! - **Discovery events**: scripts entering and leaving the tracked set
//! - **Service lifecycle**: serve attempts, failures, backoff, terminal states
//! - **Merge diagnostics**: endpoints dropped or skipped while grouping
//!
//! The [`Event`] struct carries metadata such as the service name, script
//! path, subject, error text, attempt counter, and backoff delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so events can be ordered correctly even when delivered
//! out of order through async channels.
//!
//! ## Event flow examples
//!
//! ### Admission of a new script
//! ```text
//! fs create → probe ok
//!   → ScriptAdmitted
//!   → ServiceAdded          (first script of its service name)
//!   → ServiceStarting       (actor begins serving)
//! ```
//!
//! ### Debounced modification
//! ```text
//! write burst → debounce fires → probe ok, same name
//!   → ServiceStopped        (registration torn down)
//!   → ScriptRestarted
//!   → ServiceStarting       (reconstituted with fresh endpoint set)
//! ```
//!
//! ### Registration failure
//! ```text
//! ServiceStarting → ServiceFailed → BackoffScheduled → (next attempt)
//! ...repeated failures... → ServiceDead (given up, logged at error)
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Shutdown events ===
    /// Shutdown requested (OS signal received or fatal runtime error).
    ShutdownRequested,
    /// All services stopped within the configured grace period.
    AllStoppedWithin,
    /// Grace period exceeded; some services did not stop in time.
    GraceExceeded,

    // === Discovery & script tracking ===
    /// Startup discovery walked the scripts directory; `count` services live.
    DiscoveryCompleted,
    /// A script passed its probe and joined a managed service.
    ScriptAdmitted,
    /// A script left its managed service (deleted, renamed, non-executable,
    /// or invalidated by modification).
    ScriptRemoved,
    /// A modified script was re-probed and its service reconstituted.
    ScriptRestarted,
    /// A candidate script failed its probe and was not admitted.
    ScriptRejected,

    // === Service lifecycle ===
    /// A managed service was created for its first script.
    ServiceAdded,
    /// A managed service lost its last script and was torn down.
    ServiceRemoved,
    /// A serve attempt is starting (bus registration imminent).
    ServiceStarting,
    /// A serve loop ended gracefully (deregistered from the bus).
    ServiceStopped,
    /// A serve attempt failed (registration or initialization error).
    ServiceFailed,
    /// The actor is waiting before the next serve attempt.
    BackoffScheduled,
    /// The actor exhausted its failure budget and will not restart.
    ServiceDead,

    // === Merge diagnostics ===
    /// A duplicate rewritten subject was dropped (first writer wins).
    EndpointDropped,
    /// A member script's descriptor named a different service; its
    /// endpoints were skipped.
    DescriptorMismatch,
}

/// Lifecycle event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Logical service name, if applicable.
    pub service: Option<String>,
    /// Script path, if applicable.
    pub script: Option<PathBuf>,
    /// Bus subject (rewritten form), if applicable.
    pub subject: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Serve attempt counter (starting from 1).
    pub attempt: Option<u64>,
    /// Backoff delay before the next attempt, if relevant.
    pub delay: Option<Duration>,
    /// Count payload (discovery totals).
    pub count: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            script: None,
            subject: None,
            error: None,
            attempt: None,
            delay: None,
            count: None,
        }
    }

    /// Attaches a service name.
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.service = Some(name.into());
        self
    }

    /// Attaches a script path.
    pub fn with_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script = Some(path.into());
        self
    }

    /// Attaches a bus subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches a serve attempt counter.
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    /// Attaches a count payload.
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }
}
