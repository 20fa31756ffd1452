//! # Daemon: root wiring and graceful shutdown.
//!
//! [`Daemon::run`] assembles the runtime and drives it to completion:
//!
//! ```text
//! Config + bus client ──► Daemon::run()
//!         │
//!         ├──► spawn log listener (event bus → tracing)
//!         ├──► ServiceManager::run()   (discovery + reconfiguration loop)
//!         ├──► filesystem watcher      (kept alive by this function)
//!         ├──► permission poller
//!         │
//!         └──► wait for:
//!               ├──► termination signal → cancel root token
//!               │       └──► manager drains services within the grace
//!               └──► manager exits on its own (fatal discovery error)
//! ```
//!
//! One root [`CancellationToken`] cascades from here into the manager, every
//! service actor, every serve loop, and the poller. Subprocesses are reaped
//! by the invoker's deadline handling and by `kill_on_drop` on abandonment,
//! so nothing the daemon spawned outlives the shutdown grace.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{spawn_log_listener, Event, EventBus, EventKind};
use crate::shutdown::wait_for_shutdown_signal;
use crate::subject::SubjectRewriter;
use crate::supervisor::{spawn_poller, spawn_watcher, ServiceManager, POLL_INTERVAL};

/// The assembled daemon, ready to run.
pub struct Daemon {
    config: Config,
    client: async_nats::Client,
    events: EventBus,
}

impl Daemon {
    /// Wires a daemon from validated configuration and a connected client.
    pub fn new(config: Config, client: async_nats::Client) -> Self {
        Self {
            config,
            client,
            events: EventBus::default(),
        }
    }

    /// Runs until a termination signal or a fatal startup error.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let root = CancellationToken::new();
        let log_listener = spawn_log_listener(&self.events, root.child_token());

        let rewriter = SubjectRewriter::from_host_id(&self.config.host);
        info!(host = rewriter.host(), "subjects will be prefixed per node");

        let manager = Arc::new(ServiceManager::new(
            &self.config,
            Some(self.client.clone()),
            self.events.clone(),
            rewriter,
            root.child_token(),
        ));

        // The watcher guard must outlive the loop; dropping it stops
        // surveillance.
        let _watcher = spawn_watcher(&self.config.scripts_dir, manager.sender())?;
        let poller = spawn_poller(
            self.config.scripts_dir.clone(),
            manager.sender(),
            root.child_token(),
            POLL_INTERVAL,
        );

        let mut manager_task = tokio::spawn(Arc::clone(&manager).run());

        let result = tokio::select! {
            signal = wait_for_shutdown_signal() => {
                if let Err(e) = signal {
                    error!(error = %e, "signal listener failed");
                }
                self.events.publish(Event::now(EventKind::ShutdownRequested));
                root.cancel();
                match (&mut manager_task).await {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!(error = %join_error, "manager task panicked");
                        Ok(())
                    }
                }
            }
            finished = &mut manager_task => {
                root.cancel();
                match finished {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!(error = %join_error, "manager task panicked");
                        Ok(())
                    }
                }
            }
        };

        let _ = poller.await;
        log_listener.abort();
        result
    }
}
