//! Root lifecycle owner: discovery, surveillance, grouping, restart.
//!
//! The supervisor is split into four collaborators that all feed one
//! serialized reconfiguration loop:
//! - **manager.rs**: owns the services map and the script→service index;
//!   applies admission/removal/restart strictly in event order so the bus
//!   never observes a torn endpoint set.
//! - **watcher.rs**: filesystem notifications, classified into
//!   [`ScriptEvent`]s.
//! - **debounce.rs**: collapses write bursts into one action per path.
//! - **poller.rs**: periodic executable-bit scan for platforms whose
//!   notifications elide permission changes.
//!
//! ```text
//! notify ──► watcher ──┐
//!                      ├──► mpsc ──► ServiceManager::run() ── admission
//! poller ──────────────┤                 │                    removal
//!                      │                 │                    restart
//! debounce timers ─────┘                 └──► ServiceActor per service
//! ```

mod debounce;
mod manager;
mod poller;
mod watcher;

use std::path::{Path, PathBuf};

pub use debounce::Debouncer;
pub use manager::ServiceManager;
pub use poller::{spawn_poller, POLL_INTERVAL};
pub use watcher::spawn_watcher;

/// A classified filesystem observation about one script path.
///
/// Produced by the watcher, the permission poller, and the debouncer;
/// consumed in order by the manager loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    /// A candidate appeared: fs create, rename target, or a permission
    /// flip to executable.
    Created(PathBuf),
    /// A raw write was observed; must be debounced before acting.
    Write(PathBuf),
    /// The debounce window for a modified script elapsed.
    Modified(PathBuf),
    /// The path is gone: fs remove, rename source, or a permission flip
    /// away from executable.
    Removed(PathBuf),
}

/// Sender half of the manager's reconfiguration channel.
pub type ScriptEventSender = tokio::sync::mpsc::UnboundedSender<ScriptEvent>;

/// Whether a path looks like a service script at all.
pub(crate) fn has_script_shape(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "sh")
}

/// Whether any executable bit is set on a regular file.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
}
