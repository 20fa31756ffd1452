//! # ServiceManager: the serialized reconfiguration loop.
//!
//! Owns every managed service and the script→service index, and is the only
//! writer of either. The watcher, the permission poller, and the debounce
//! timers all funnel [`ScriptEvent`]s into one channel; the manager applies
//! them strictly in arrival order. Per-path ordering is therefore preserved,
//! and the bus never observes a partially reconfigured endpoint set.
//!
//! ## Lock discipline
//! One coarse lock guards the two maps. It is held for bookkeeping only and
//! released before any subprocess probe or actor join: long operations work
//! on local snapshots (an `Arc` of the service, taken actor handles) and
//! retake the lock just to commit the result. Inspection calls therefore
//! never wait out a script's describe deadline.
//!
//! ## Admission
//! 1. Already-tracked paths are ignored with a warning.
//! 2. The script is probed; a failing probe rejects it.
//! 3. A service with the descriptor's name either gains the script (and is
//!    torn down and reconstituted so the endpoint change is atomic on the
//!    bus) or is created fresh and started under its own actor.
//!
//! ## Removal
//! The path's endpoints leave its service; an emptied service is torn down
//! before the operation returns, so a service with zero scripts is never
//! observable.
//!
//! ## Modification
//! Fires once per debounced burst. The script is re-probed: an invalid or
//! vanished script becomes a removal, a changed service name becomes a
//! removal plus an admission, and an unchanged name restarts the owning
//! service so its fresh descriptor is re-merged from scratch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::debounce::{Debouncer, DEBOUNCE_WINDOW};
use super::{has_script_shape, is_executable, ScriptEvent, ScriptEventSender};
use crate::config::Config;
use crate::descriptor::ServiceDescriptor;
use crate::error::{RuntimeError, ScriptError};
use crate::events::{Event, EventBus, EventKind};
use crate::policies::BackoffPolicy;
use crate::script::{ScriptInvoker, ScriptRunner, DESCRIBE_DEADLINE};
use crate::service::{ActorExit, ManagedService, ServiceActor};
use crate::subject::SubjectRewriter;

/// One supervised service: the service itself plus its actor's handles.
struct ServiceSlot {
    service: Arc<ManagedService>,
    cancel: CancellationToken,
    join: Option<JoinHandle<ActorExit>>,
}

/// The two maps the reconfiguration loop owns.
#[derive(Default)]
struct ManagerState {
    /// service name → slot.
    services: HashMap<String, ServiceSlot>,
    /// script path → owning service name.
    script_index: HashMap<PathBuf, String>,
}

/// Root lifecycle owner for every managed service.
pub struct ServiceManager {
    scripts_dir: PathBuf,
    client: Option<async_nats::Client>,
    events: EventBus,
    rewriter: SubjectRewriter,
    request_timeout: std::time::Duration,
    shutdown_grace: std::time::Duration,
    backoff: BackoffPolicy,
    root: CancellationToken,
    state: Mutex<ManagerState>,
    tx: ScriptEventSender,
    rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ScriptEvent>>>,
    debouncer: Debouncer,
}

impl ServiceManager {
    /// Creates a manager for the configured scripts directory.
    ///
    /// `client` of `None` runs the full bookkeeping without ever touching
    /// the bus; the production daemon always passes `Some`.
    pub fn new(
        config: &Config,
        client: Option<async_nats::Client>,
        events: EventBus,
        rewriter: SubjectRewriter,
        root: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            scripts_dir: config.scripts_dir.clone(),
            client,
            events,
            rewriter,
            request_timeout: config.request_timeout(),
            shutdown_grace: config.shutdown_grace(),
            backoff: BackoffPolicy::default(),
            root,
            state: Mutex::new(ManagerState::default()),
            debouncer: Debouncer::new(DEBOUNCE_WINDOW, tx.clone()),
            tx,
            rx: std::sync::Mutex::new(Some(rx)),
        }
    }

    /// Sender for the watcher, poller, and anything else reporting script
    /// observations.
    pub fn sender(&self) -> ScriptEventSender {
        self.tx.clone()
    }

    /// Discovers existing scripts, then applies events until cancellation.
    ///
    /// On exit every service is cancelled and joined, bounded by the
    /// shutdown grace.
    pub async fn run(self: Arc<Self>) -> Result<(), RuntimeError> {
        self.discover().await?;

        let Some(mut rx) = self.rx.lock().unwrap().take() else {
            warn!("manager loop already running");
            return Ok(());
        };

        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                }
            }
        }

        self.shutdown_services().await;
        Ok(())
    }

    /// Applies one classified observation.
    async fn handle_event(&self, event: ScriptEvent) {
        debug!(?event, "script event");
        match event {
            ScriptEvent::Created(path) => self.handle_candidate(path).await,
            ScriptEvent::Write(path) => self.debouncer.schedule(path),
            ScriptEvent::Modified(path) => self.handle_modified(path).await,
            ScriptEvent::Removed(path) => self.remove_script(&path).await,
        }
    }

    /// Non-recursive startup walk of the scripts directory.
    pub async fn discover(&self) -> Result<(), RuntimeError> {
        info!(path = %self.scripts_dir.display(), "discovering scripts");

        let mut entries = match tokio::fs::read_dir(&self.scripts_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.scripts_dir.display(), "scripts directory does not exist");
                self.events
                    .publish(Event::now(EventKind::DiscoveryCompleted).with_count(0));
                return Ok(());
            }
            Err(e) => {
                return Err(RuntimeError::Discovery {
                    path: self.scripts_dir.clone(),
                    reason: e.to_string(),
                })
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if has_script_shape(&path) && is_executable(&path) {
                        self.handle_candidate(path).await;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "error accessing entry during discovery");
                    break;
                }
            }
        }

        let count = self.state.lock().await.services.len();
        self.events
            .publish(Event::now(EventKind::DiscoveryCompleted).with_count(count));
        info!(count, "discovery completed");
        Ok(())
    }

    /// Validity check plus admission for a candidate path.
    pub async fn handle_candidate(&self, path: PathBuf) {
        if !has_script_shape(&path) || !is_executable(&path) {
            return;
        }
        match self.probe(&path).await {
            Ok(descriptor) => self.admit(path, descriptor.name).await,
            Err(e) => {
                self.events.publish(
                    Event::now(EventKind::ScriptRejected)
                        .with_script(&path)
                        .with_error(e.to_string()),
                );
            }
        }
    }

    /// Places a probed script into its service group and (re)starts it.
    ///
    /// The state lock covers bookkeeping only. Joining an existing group
    /// re-probes through [`Self::restart_service`] with the lock released;
    /// a fresh group is probed before it is published into the maps, then
    /// the lock is retaken to commit.
    async fn admit(&self, path: PathBuf, service_name: String) {
        enum Placement {
            Joined,
            Created(Arc<ManagedService>),
        }

        let placement = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if let Some(existing) = state.script_index.get(&path) {
                warn!(
                    script = %path.display(),
                    service = %existing,
                    "script already handled by service"
                );
                return;
            }

            let runner: Arc<dyn ScriptRunner> = Arc::new(ScriptInvoker::new(&path));
            if let Some(slot) = state.services.get_mut(&service_name) {
                slot.service.add_script(&path, runner).await;
                state.script_index.insert(path.clone(), service_name.clone());
                Placement::Joined
            } else {
                let service = Arc::new(ManagedService::new(
                    &service_name,
                    self.rewriter.clone(),
                    self.events.clone(),
                    self.request_timeout,
                ));
                service.add_script(&path, runner).await;
                Placement::Created(service)
            }
        };

        match placement {
            Placement::Joined => {
                self.restart_service(&service_name).await;
                info!(
                    script = %path.display(),
                    service = %service_name,
                    "added script to existing service group"
                );
            }
            Placement::Created(service) => {
                // Nothing else can see this service yet: probe it unlocked.
                if let Err(e) = service.initialize(DESCRIBE_DEADLINE).await {
                    error!(
                        script = %path.display(),
                        service = %service_name,
                        error = %e,
                        "failed to initialize new service"
                    );
                    self.events.publish(
                        Event::now(EventKind::ScriptRejected)
                            .with_script(&path)
                            .with_error(e.to_string()),
                    );
                    return;
                }

                let mut guard = self.state.lock().await;
                let state = &mut *guard;
                if state.script_index.contains_key(&path) {
                    warn!(
                        script = %path.display(),
                        "script was admitted concurrently, keeping existing placement"
                    );
                    return;
                }
                if let Some(slot) = state.services.get_mut(&service_name) {
                    // The name got claimed while we probed: fold this script
                    // into that group instead of racing it.
                    let runner: Arc<dyn ScriptRunner> = Arc::new(ScriptInvoker::new(&path));
                    slot.service.add_script(&path, runner).await;
                    state.script_index.insert(path.clone(), service_name.clone());
                    drop(guard);
                    self.restart_service(&service_name).await;
                } else {
                    let (cancel, join) = self.spawn_actor(&service);
                    state.services.insert(
                        service_name.clone(),
                        ServiceSlot {
                            service,
                            cancel,
                            join,
                        },
                    );
                    state.script_index.insert(path.clone(), service_name.clone());
                    self.events
                        .publish(Event::now(EventKind::ServiceAdded).with_service(&service_name));
                }
            }
        }

        self.events.publish(
            Event::now(EventKind::ScriptAdmitted)
                .with_service(&service_name)
                .with_script(&path),
        );
    }

    /// Removes a path from its service; tears the service down when emptied.
    ///
    /// The state lock covers the bookkeeping only: an emptied service leaves
    /// the maps before the lock is released, and joining its actor — like
    /// re-probing the survivors of a still-populated group — happens after.
    pub async fn remove_script(&self, path: &Path) {
        let (service_name, emptied, remaining) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let Some(service_name) = state.script_index.remove(path) else {
                debug!(script = %path.display(), "script not tracked by any service");
                return;
            };

            let Some(slot) = state.services.get_mut(&service_name) else {
                warn!(
                    script = %path.display(),
                    service = %service_name,
                    "orphaned index entry, service does not exist"
                );
                return;
            };

            let remaining = slot.service.remove_script(path).await;
            let emptied = if remaining == 0 {
                state.services.remove(&service_name)
            } else {
                None
            };
            (service_name, emptied, remaining)
        };

        if let Some(mut slot) = emptied {
            slot.cancel.cancel();
            if let Some(join) = slot.join.take() {
                let _ = join.await;
            }
            self.events
                .publish(Event::now(EventKind::ServiceRemoved).with_service(&service_name));
        } else {
            self.restart_service(&service_name).await;
            info!(
                script = %path.display(),
                service = %service_name,
                remaining,
                "removed script from service group"
            );
        }

        self.events.publish(
            Event::now(EventKind::ScriptRemoved)
                .with_service(&service_name)
                .with_script(path),
        );
    }

    /// Acts on a debounced write: removal, restart, or re-grouping.
    pub async fn handle_modified(&self, path: PathBuf) {
        self.debouncer.complete(&path);

        if !has_script_shape(&path) || !is_executable(&path) {
            self.remove_script(&path).await;
            return;
        }

        match self.probe(&path).await {
            Ok(descriptor) => {
                let tracked = self.state.lock().await.script_index.get(&path).cloned();
                match tracked {
                    None => self.admit(path, descriptor.name).await,
                    Some(current) if current == descriptor.name => {
                        self.restart_service(&current).await;
                        self.events.publish(
                            Event::now(EventKind::ScriptRestarted)
                                .with_service(&current)
                                .with_script(&path),
                        );
                    }
                    Some(_) => {
                        // The descriptor changed identity: leave the old
                        // group, then join the new one.
                        self.remove_script(&path).await;
                        self.admit(path, descriptor.name).await;
                    }
                }
            }
            Err(e) => {
                let tracked = self.state.lock().await.script_index.contains_key(&path);
                if tracked {
                    warn!(
                        script = %path.display(),
                        error = %e,
                        "modified script no longer valid, removing"
                    );
                    self.remove_script(&path).await;
                } else {
                    self.events.publish(
                        Event::now(EventKind::ScriptRejected)
                            .with_script(&path)
                            .with_error(e.to_string()),
                    );
                }
            }
        }
    }

    /// Probes a script for its descriptor with the describe deadline.
    async fn probe(&self, path: &Path) -> Result<ServiceDescriptor, ScriptError> {
        ScriptInvoker::new(path).describe(DESCRIBE_DEADLINE).await
    }

    /// Tears a live registration down, re-merges, and reconstitutes it.
    ///
    /// The bus sees the old endpoint set disappear and the new one appear
    /// whole; brief unavailability is preferred to inconsistency. The state
    /// lock is held only to take and to commit the actor handles; joining
    /// the old actor and re-probing the members run on a local snapshot.
    async fn restart_service(&self, service_name: &str) {
        let (service, join) = {
            let mut state = self.state.lock().await;
            let Some(slot) = state.services.get_mut(service_name) else {
                debug!(service = service_name, "service vanished before restart");
                return;
            };
            slot.cancel.cancel();
            (Arc::clone(&slot.service), slot.join.take())
        };

        if let Some(join) = join {
            let _ = join.await;
        }

        match service.initialize(DESCRIBE_DEADLINE).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                if let Some(slot) = state.services.get_mut(service_name) {
                    let (cancel, join) = self.spawn_actor(&slot.service);
                    slot.cancel = cancel;
                    slot.join = join;
                }
            }
            Err(e) => {
                error!(
                    service = service_name,
                    error = %e,
                    "failed to re-initialize service, it stays down"
                );
                self.events.publish(
                    Event::now(EventKind::ServiceFailed)
                        .with_service(service_name)
                        .with_error(e.to_string()),
                );
            }
        }
    }

    /// Starts the actor for a service, unless no bus client is attached.
    fn spawn_actor(
        &self,
        service: &Arc<ManagedService>,
    ) -> (CancellationToken, Option<JoinHandle<ActorExit>>) {
        let token = self.root.child_token();
        let Some(client) = self.client.clone() else {
            debug!(
                service = service.name(),
                "no bus client attached, service will not serve"
            );
            return (token, None);
        };
        let actor = ServiceActor::new(
            Arc::clone(service),
            client,
            self.events.clone(),
            self.backoff,
        );
        let join = tokio::spawn(actor.run(token.clone()));
        (token, Some(join))
    }

    /// Cancels every service and waits for the actors, bounded by the grace.
    async fn shutdown_services(&self) {
        let slots: Vec<(String, ServiceSlot)> = {
            let mut state = self.state.lock().await;
            state.script_index.clear();
            state.services.drain().collect()
        };

        for (_, slot) in &slots {
            slot.cancel.cancel();
        }

        let drain = async {
            for (_, slot) in slots {
                if let Some(join) = slot.join {
                    let _ = join.await;
                }
            }
        };

        match time::timeout(self.shutdown_grace, drain).await {
            Ok(()) => self
                .events
                .publish(Event::now(EventKind::AllStoppedWithin)),
            Err(_) => {
                warn!(grace = ?self.shutdown_grace, "services did not stop within grace");
                self.events.publish(Event::now(EventKind::GraceExceeded));
            }
        }
    }

    // ---------------------------
    // Inspection (used by tests and the daemon's shutdown path)
    // ---------------------------

    /// Number of live managed services.
    pub async fn service_count(&self) -> usize {
        self.state.lock().await.services.len()
    }

    /// The service a path currently belongs to, if any.
    pub async fn service_of(&self, path: &Path) -> Option<String> {
        self.state.lock().await.script_index.get(path).cloned()
    }

    /// Handle to a live managed service by name.
    pub async fn service(&self, name: &str) -> Option<Arc<ManagedService>> {
        self.state
            .lock()
            .await
            .services
            .get(name)
            .map(|slot| Arc::clone(&slot.service))
    }
}
