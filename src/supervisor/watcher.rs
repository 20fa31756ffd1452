//! # Filesystem surveillance of the scripts directory.
//!
//! One non-recursive watcher on the configured directory. Raw notifications
//! are classified into [`ScriptEvent`]s on the watcher's callback thread and
//! pushed into the manager's channel; everything stateful happens on the
//! manager loop.
//!
//! ## Classification
//!
//! | Raw event                  | Action                                   |
//! |----------------------------|------------------------------------------|
//! | create                     | `Created` → validity check → admission   |
//! | data/metadata write        | `Write` → debounce → act once            |
//! | remove                     | `Removed`                                |
//! | rename (source path)       | `Removed` — the old path is gone         |
//! | rename (target path)       | `Created` — a candidate appeared         |
//!
//! Paths without the `.sh` extension are ignored outright.

use std::path::Path;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecursiveMode, Watcher};
use tracing::{error, info};

use super::{has_script_shape, ScriptEvent, ScriptEventSender};
use crate::error::RuntimeError;

/// Installs the watcher and starts feeding classified events into `tx`.
///
/// The returned watcher must be kept alive for the daemon's lifetime;
/// dropping it stops surveillance.
pub fn spawn_watcher(
    dir: &Path,
    tx: ScriptEventSender,
) -> Result<notify::RecommendedWatcher, RuntimeError> {
    let sender = tx.clone();
    let mut watcher =
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                for script_event in classify(event) {
                    let _ = sender.send(script_event);
                }
            }
            Err(e) => error!(error = %e, "file watcher error"),
        })
        .map_err(|e| RuntimeError::Watch {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| RuntimeError::Watch {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

    info!(path = %dir.display(), "watching scripts directory");
    Ok(watcher)
}

/// Maps one raw notification to zero or more script events.
fn classify(event: notify::Event) -> Vec<ScriptEvent> {
    let mut out = Vec::new();
    let scripts = || event.paths.iter().filter(|p| has_script_shape(p)).cloned();

    match event.kind {
        EventKind::Create(_) => out.extend(scripts().map(ScriptEvent::Created)),
        EventKind::Remove(_) => out.extend(scripts().map(ScriptEvent::Removed)),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            out.extend(scripts().map(ScriptEvent::Removed));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            out.extend(scripts().map(ScriptEvent::Created));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths come ordered: the vanished source, then the new target.
            if let Some(from) = event.paths.first() {
                if has_script_shape(from) {
                    out.push(ScriptEvent::Removed(from.clone()));
                }
            }
            if let Some(to) = event.paths.get(1) {
                if has_script_shape(to) {
                    out.push(ScriptEvent::Created(to.clone()));
                }
            }
        }
        EventKind::Modify(_) => out.extend(scripts().map(ScriptEvent::Write)),
        _ => {}
    }
    out
}
