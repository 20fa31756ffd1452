//! # Permission-flip polling.
//!
//! Not every platform's notification API reports changes to the executable
//! bit, so the supervisor additionally scans the scripts directory on a
//! fixed interval and compares each `.sh` file's executability against the
//! last observed value. A flip to executable becomes a candidate admission;
//! a flip away becomes a removal.
//!
//! First observations establish a baseline and trigger nothing — creation
//! and deletion are the watcher's job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{has_script_shape, is_executable, ScriptEvent, ScriptEventSender};

/// How often the executable-bit scan runs.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns the permission poller; runs until the token is cancelled.
pub fn spawn_poller(
    dir: PathBuf,
    tx: ScriptEventSender,
    token: CancellationToken,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut known: HashMap<PathBuf, bool> = HashMap::new();
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => scan(&dir, &tx, &mut known).await,
            }
        }
    })
}

/// One pass over the directory, comparing against the previous pass.
async fn scan(dir: &Path, tx: &ScriptEventSender, known: &mut HashMap<PathBuf, bool>) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };

    let mut current: HashMap<PathBuf, bool> = HashMap::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !has_script_shape(&path) {
            continue;
        }
        let executable = is_executable(&path);
        match known.get(&path) {
            Some(false) if executable => {
                let _ = tx.send(ScriptEvent::Created(path.clone()));
            }
            Some(true) if !executable => {
                let _ = tx.send(ScriptEvent::Removed(path.clone()));
            }
            _ => {}
        }
        current.insert(path, executable);
    }

    // Vanished files are dropped; their removal came from the watcher.
    *known = current;
}
