//! # Per-path write debouncing.
//!
//! Editors save in bursts: truncate, write, write, chmod. Acting on every
//! event would restart a service several times per save. [`Debouncer`]
//! collapses a burst into a single [`ScriptEvent::Modified`]:
//! the first write arms a timer, each further write within the window
//! resets it, and the action fires once when the window elapses.
//!
//! Entries are transient; the manager calls [`Debouncer::complete`] when it
//! consumes the fired event.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use super::{ScriptEvent, ScriptEventSender};

/// Default debounce window for write bursts.
pub(crate) const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Collapses write bursts into one action per path.
pub struct Debouncer {
    window: Duration,
    tx: ScriptEventSender,
    pending: Mutex<HashMap<PathBuf, JoinHandle<()>>>,
}

impl Debouncer {
    /// Creates a debouncer firing [`ScriptEvent::Modified`] into `tx`.
    pub fn new(window: Duration, tx: ScriptEventSender) -> Self {
        Self {
            window,
            tx,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Records a write for `path`, arming or resetting its timer.
    pub fn schedule(&self, path: PathBuf) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.remove(&path) {
            previous.abort();
        }
        let tx = self.tx.clone();
        let fire_path = path.clone();
        let window = self.window;
        pending.insert(
            path,
            tokio::spawn(async move {
                time::sleep(window).await;
                let _ = tx.send(ScriptEvent::Modified(fire_path));
            }),
        );
    }

    /// Drops the tracking entry for a fired (or abandoned) path.
    pub fn complete(&self, path: &Path) {
        if let Some(handle) = self.pending.lock().unwrap().remove(path) {
            handle.abort();
        }
    }
}
