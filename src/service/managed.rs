//! # ManagedService: one logical service, many scripts.
//!
//! A managed service owns everything between the bus and the scripts that
//! claim one service name:
//! - the insertion-ordered script set (first writer wins must be
//!   deterministic, so order matters);
//! - the effective endpoint map, rebuilt from scratch on every
//!   [`initialize`](ManagedService::initialize) by re-probing the members;
//! - the bus registration, alive only for the duration of one
//!   [`serve`](ManagedService::serve) call;
//! - request dispatch from rewritten subject to owning script.
//!
//! ## Merge rules
//! - Scripts are probed in insertion order, endpoints in declaration order.
//! - The first script to claim a rewritten subject owns it; later claims are
//!   dropped with a warning event.
//! - A member whose descriptor names a different service is skipped, not
//!   fatal to its siblings; the same goes for individual probe failures.
//!
//! ## State machine
//! ```text
//! Uninitialized ──initialize()──► Initialized ──serve()──► Serving
//!       ▲                                                    │
//!       └──────────────── re-initialize ◄────────────────────┤
//! Serving ──cancel──► Stopped          Serving ──error──► Failed
//! ```
//!
//! The endpoint set the bus sees is a snapshot taken at serve time; the
//! supervisor tears a registration down and reconstitutes it to change the
//! set, so the bus never observes a partial one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_nats::service::ServiceExt;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusRequest, NatsRequest};
use crate::descriptor::Endpoint;
use crate::error::RuntimeError;
use crate::events::{Event, EventBus, EventKind};
use crate::script::{stderr_excerpt, ExecutionRecord, ScriptRunner};
use crate::subject::SubjectRewriter;

/// Lifecycle state of a managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Created, endpoints not merged yet.
    Uninitialized,
    /// Endpoints merged, not on the bus.
    Initialized,
    /// Registered on the bus and accepting requests.
    Serving,
    /// Deregistered after a graceful cancellation.
    Stopped,
    /// The last initialize or serve attempt failed.
    Failed,
}

/// One member script, in insertion order.
#[derive(Clone)]
struct ScriptEntry {
    path: PathBuf,
    runner: Arc<dyn ScriptRunner>,
}

/// The resolved owner of one rewritten subject.
#[derive(Clone)]
struct EndpointBinding {
    /// Declared endpoint (pre-rewrite subject) as the script reported it.
    endpoint: Endpoint,
    /// Owning script path.
    script: PathBuf,
    /// Owning script handle.
    runner: Arc<dyn ScriptRunner>,
}

struct Inner {
    version: String,
    description: String,
    scripts: Vec<ScriptEntry>,
    endpoints: HashMap<String, EndpointBinding>,
    state: ServiceState,
}

/// One logical service registered on the bus, backed by shell scripts.
pub struct ManagedService {
    name: String,
    rewriter: SubjectRewriter,
    events: EventBus,
    request_timeout: Duration,
    inner: RwLock<Inner>,
}

impl ManagedService {
    /// Creates an empty managed service for `name`.
    pub fn new(
        name: impl Into<String>,
        rewriter: SubjectRewriter,
        events: EventBus,
        request_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            rewriter,
            events,
            request_timeout,
            inner: RwLock::new(Inner {
                version: String::new(),
                description: String::new(),
                scripts: Vec::new(),
                endpoints: HashMap::new(),
                state: ServiceState::Uninitialized,
            }),
        }
    }

    /// The logical service name this group was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ServiceState {
        self.inner.read().await.state
    }

    /// Number of member scripts.
    pub async fn script_count(&self) -> usize {
        self.inner.read().await.scripts.len()
    }

    /// Whether `path` is a member of this service.
    pub async fn has_script(&self, path: &Path) -> bool {
        self.inner
            .read()
            .await
            .scripts
            .iter()
            .any(|entry| entry.path == path)
    }

    /// Rewritten subject → owning script path, for inspection and tests.
    pub async fn endpoint_owners(&self) -> HashMap<String, PathBuf> {
        self.inner
            .read()
            .await
            .endpoints
            .iter()
            .map(|(subject, binding)| (subject.clone(), binding.script.clone()))
            .collect()
    }

    /// Adds (or replaces) a member script.
    ///
    /// Endpoints do not change until the next [`initialize`](Self::initialize);
    /// the supervisor always re-initializes after membership changes.
    pub async fn add_script(&self, path: impl Into<PathBuf>, runner: Arc<dyn ScriptRunner>) {
        let path = path.into();
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.scripts.iter_mut().find(|entry| entry.path == path) {
            entry.runner = runner;
        } else {
            inner.scripts.push(ScriptEntry { path, runner });
        }
    }

    /// Removes a member script and every endpoint it owns.
    ///
    /// Returns the number of scripts remaining; zero means the supervisor
    /// must tear this service down before releasing it.
    pub async fn remove_script(&self, path: &Path) -> usize {
        let mut inner = self.inner.write().await;
        inner.scripts.retain(|entry| entry.path != path);
        inner.endpoints.retain(|_, binding| binding.script != path);
        inner.scripts.len()
    }

    /// Rebuilds the effective endpoint map by re-probing every member.
    ///
    /// Idempotent; always merges from scratch. Individual probe failures and
    /// name mismatches skip the offending script without failing its
    /// siblings. Fails only when no usable endpoint remains.
    pub async fn initialize(&self, describe_deadline: Duration) -> Result<(), RuntimeError> {
        let scripts: Vec<ScriptEntry> = self.inner.read().await.scripts.clone();
        if scripts.is_empty() {
            return Err(RuntimeError::NoScripts {
                service: self.name.clone(),
            });
        }

        let mut endpoints: HashMap<String, EndpointBinding> = HashMap::new();
        let mut identity: Option<(String, String)> = None;

        for entry in &scripts {
            let descriptor = match entry.runner.describe(describe_deadline).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(
                        service = %self.name,
                        script = %entry.path.display(),
                        error = %e,
                        "probe failed during initialize, skipping script"
                    );
                    continue;
                }
            };

            if descriptor.name != self.name {
                self.events.publish(
                    Event::now(EventKind::DescriptorMismatch)
                        .with_service(&self.name)
                        .with_script(&entry.path)
                        .with_error(format!("descriptor names '{}'", descriptor.name)),
                );
                continue;
            }

            if identity.is_none() {
                identity = Some((descriptor.version.clone(), descriptor.description.clone()));
            }

            for endpoint in descriptor.endpoints {
                let rewritten = self.rewriter.rewrite(&endpoint.subject);
                if endpoints.contains_key(&rewritten) {
                    self.events.publish(
                        Event::now(EventKind::EndpointDropped)
                            .with_service(&self.name)
                            .with_script(&entry.path)
                            .with_subject(&rewritten),
                    );
                    continue;
                }
                endpoints.insert(
                    rewritten,
                    EndpointBinding {
                        endpoint,
                        script: entry.path.clone(),
                        runner: Arc::clone(&entry.runner),
                    },
                );
            }
        }

        if endpoints.is_empty() {
            self.set_state(ServiceState::Failed).await;
            return Err(RuntimeError::NoEndpoints {
                service: self.name.clone(),
            });
        }

        let mut inner = self.inner.write().await;
        let (version, description) = identity.unwrap_or_default();
        inner.version = version;
        inner.description = description;
        inner.endpoints = endpoints;
        inner.state = ServiceState::Initialized;
        debug!(
            service = %self.name,
            endpoints = inner.endpoints.len(),
            scripts = inner.scripts.len(),
            "service initialized"
        );
        Ok(())
    }

    /// Registers on the bus and serves requests until the token is cancelled.
    ///
    /// Registration uses a snapshot of the current endpoint set. On
    /// cancellation the service deregisters first (so the bus stops
    /// delivering), then drains in-flight requests.
    pub async fn serve(
        self: &Arc<Self>,
        client: &async_nats::Client,
        token: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let (version, description, bindings) = {
            let inner = self.inner.read().await;
            (
                inner.version.clone(),
                inner.description.clone(),
                inner.endpoints.clone(),
            )
        };
        if bindings.is_empty() {
            return Err(RuntimeError::NoEndpoints {
                service: self.name.clone(),
            });
        }

        let mut builder = client.service_builder();
        if !description.is_empty() {
            builder = builder.description(description);
        }
        let service = match builder.start(self.name.clone(), bus_version(&version)).await {
            Ok(service) => service,
            Err(e) => {
                self.set_state(ServiceState::Failed).await;
                return Err(RuntimeError::BusRegistration {
                    service: self.name.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let mut pumps = JoinSet::new();
        for (subject, binding) in &bindings {
            let mut endpoint_builder = service.endpoint_builder().name(&binding.endpoint.name);
            let metadata = binding.endpoint.bus_metadata();
            if !metadata.is_empty() {
                endpoint_builder = endpoint_builder.metadata(metadata.into_iter().collect());
            }
            let endpoint = match endpoint_builder.add(subject.clone()).await {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    let _ = service.stop().await;
                    self.set_state(ServiceState::Failed).await;
                    return Err(RuntimeError::BusRegistration {
                        service: self.name.clone(),
                        reason: format!(
                            "endpoint '{}' on {subject}: {e}",
                            binding.endpoint.name
                        ),
                    });
                }
            };
            let me = Arc::clone(self);
            let pump_token = token.clone();
            pumps.spawn(async move { me.pump(endpoint, pump_token).await });
        }

        self.set_state(ServiceState::Serving).await;
        info!(
            service = %self.name,
            endpoints = bindings.len(),
            "service registered on bus"
        );

        token.cancelled().await;

        if let Err(e) = service.stop().await {
            warn!(service = %self.name, error = %e, "error deregistering service");
        }
        while pumps.join_next().await.is_some() {}
        self.set_state(ServiceState::Stopped).await;
        info!(service = %self.name, "service deregistered from bus");
        Ok(())
    }

    /// Reads requests from one endpoint and dispatches each concurrently.
    async fn pump(
        self: Arc<Self>,
        mut endpoint: async_nats::service::endpoint::Endpoint,
        token: CancellationToken,
    ) {
        let mut inflight = JoinSet::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = endpoint.next() => match next {
                    Some(request) => {
                        let me = Arc::clone(&self);
                        inflight.spawn(async move {
                            let request = NatsRequest::new(request);
                            me.dispatch(&request).await;
                        });
                    }
                    None => break,
                }
            }
        }
        let _ = endpoint.stop().await;
        while inflight.join_next().await.is_some() {}
    }

    /// Routes one inbound request to the script owning its subject.
    pub async fn dispatch(&self, req: &dyn BusRequest) {
        let rewritten = req.subject().to_string();
        let binding = self.inner.read().await.endpoints.get(&rewritten).cloned();
        let Some(binding) = binding else {
            warn!(service = %self.name, subject = %rewritten, "no handler for subject");
            if let Err(e) = req
                .respond_error(&format!("no handler for subject: {rewritten}"))
                .await
            {
                warn!(service = %self.name, subject = %rewritten, error = %e, "failed to send reply");
            }
            return;
        };

        // The script expects the subject it declared, not the rewritten one.
        let declared = self.rewriter.strip(&rewritten).to_string();
        let record = binding
            .runner
            .handle(&declared, req.payload(), self.request_timeout)
            .await;

        debug!(
            service = %self.name,
            subject = %rewritten,
            script = %binding.script.display(),
            outcome = record.as_label(),
            request_bytes = req.payload().len(),
            "request handled"
        );

        let sent = match record {
            ExecutionRecord::Ok { stdout, stderr } => {
                if !stderr.is_empty() {
                    debug!(
                        service = %self.name,
                        script = %binding.script.display(),
                        stderr = %stderr_excerpt(&stderr),
                        "script wrote to stderr on success"
                    );
                }
                req.respond(Bytes::from(stdout)).await
            }
            ExecutionRecord::ScriptFailed {
                exit_code, stderr, ..
            } => {
                let mut message = format!("script failed with exit code {exit_code}");
                let excerpt = stderr_excerpt(&stderr);
                if !excerpt.is_empty() {
                    message.push_str(": ");
                    message.push_str(&excerpt);
                }
                req.respond_error(&message).await
            }
            ExecutionRecord::Timeout { deadline } => {
                req.respond_error(&format!("script timed out after {deadline:?}"))
                    .await
            }
            ExecutionRecord::SpawnFailed { error } => {
                req.respond_error(&format!("script could not be started: {error}"))
                    .await
            }
        };

        if let Err(e) = sent {
            warn!(service = %self.name, subject = %rewritten, error = %e, "failed to send reply");
        }
    }

    async fn set_state(&self, state: ServiceState) {
        self.inner.write().await.state = state;
    }
}

/// Renders a descriptor version into the semver form the bus insists on.
///
/// Bare numeric versions are padded (`"1"` → `"1.0.0"`), empty versions
/// become `0.0.1`, anything else passes through for the bus to judge.
fn bus_version(version: &str) -> String {
    let v = version.trim();
    if v.is_empty() {
        return "0.0.1".to_string();
    }
    let numeric = v
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !numeric {
        return v.to_string();
    }
    match v.split('.').count() {
        1 => format!("{v}.0.0"),
        2 => format!("{v}.0"),
        _ => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::descriptor::ServiceDescriptor;
    use crate::error::ScriptError;

    /// Scripted [`ScriptRunner`]: a fixed descriptor and a fixed reply.
    struct MockRunner {
        path: PathBuf,
        descriptor: Option<ServiceDescriptor>,
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        last_subject: Mutex<Option<String>>,
        last_payload: Mutex<Option<Vec<u8>>>,
    }

    impl MockRunner {
        fn describing(path: &str, descriptor: ServiceDescriptor) -> Arc<Self> {
            Arc::new(Self {
                path: PathBuf::from(path),
                descriptor: Some(descriptor),
                exit_code: 0,
                stdout: b"ok".to_vec(),
                stderr: Vec::new(),
                last_subject: Mutex::new(None),
                last_payload: Mutex::new(None),
            })
        }

        fn failing_probe(path: &str) -> Arc<Self> {
            Arc::new(Self {
                path: PathBuf::from(path),
                descriptor: None,
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                last_subject: Mutex::new(None),
                last_payload: Mutex::new(None),
            })
        }

        fn with_reply(mut self: Arc<Self>, exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Arc<Self> {
            let this = Arc::get_mut(&mut self).unwrap();
            this.exit_code = exit_code;
            this.stdout = stdout.to_vec();
            this.stderr = stderr.to_vec();
            self
        }
    }

    #[async_trait]
    impl ScriptRunner for MockRunner {
        fn path(&self) -> &Path {
            &self.path
        }

        async fn describe(&self, _deadline: Duration) -> Result<ServiceDescriptor, ScriptError> {
            match &self.descriptor {
                Some(descriptor) => Ok(descriptor.clone()),
                None => Err(ScriptError::ProbeFailed {
                    path: self.path.clone(),
                    stderr: "boom".to_string(),
                }),
            }
        }

        async fn handle(
            &self,
            subject: &str,
            payload: &[u8],
            _deadline: Duration,
        ) -> ExecutionRecord {
            *self.last_subject.lock().unwrap() = Some(subject.to_string());
            *self.last_payload.lock().unwrap() = Some(payload.to_vec());
            if self.exit_code == 0 {
                ExecutionRecord::Ok {
                    stdout: self.stdout.clone(),
                    stderr: self.stderr.clone(),
                }
            } else {
                ExecutionRecord::ScriptFailed {
                    exit_code: self.exit_code,
                    stdout: self.stdout.clone(),
                    stderr: self.stderr.clone(),
                }
            }
        }
    }

    /// Captures the single reply a dispatch produces.
    struct MockRequest {
        subject: String,
        payload: Vec<u8>,
        reply: Mutex<Option<Result<Vec<u8>, String>>>,
    }

    impl MockRequest {
        fn new(subject: &str, payload: &[u8]) -> Self {
            Self {
                subject: subject.to_string(),
                payload: payload.to_vec(),
                reply: Mutex::new(None),
            }
        }

        fn reply(&self) -> Option<Result<Vec<u8>, String>> {
            self.reply.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BusRequest for MockRequest {
        fn subject(&self) -> &str {
            &self.subject
        }

        fn payload(&self) -> &[u8] {
            &self.payload
        }

        async fn respond(&self, payload: Bytes) -> Result<(), crate::bus::ReplyError> {
            *self.reply.lock().unwrap() = Some(Ok(payload.to_vec()));
            Ok(())
        }

        async fn respond_error(&self, message: &str) -> Result<(), crate::bus::ReplyError> {
            *self.reply.lock().unwrap() = Some(Err(message.to_string()));
            Ok(())
        }
    }

    fn descriptor(name: &str, endpoints: &[(&str, &str)]) -> ServiceDescriptor {
        ServiceDescriptor {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            endpoints: endpoints
                .iter()
                .map(|(ep_name, subject)| Endpoint {
                    name: ep_name.to_string(),
                    subject: subject.to_string(),
                    description: String::new(),
                    metadata: None,
                })
                .collect(),
        }
    }

    fn service() -> ManagedService {
        ManagedService::new(
            "Sys",
            SubjectRewriter::new("web01"),
            EventBus::default(),
            Duration::from_secs(5),
        )
    }

    const DEADLINE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn groups_endpoints_from_two_scripts() {
        let svc = service();
        svc.add_script(
            "/s/facts.sh",
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")])),
        )
        .await;
        svc.add_script(
            "/s/hw.sh",
            MockRunner::describing("/s/hw.sh", descriptor("Sys", &[("Hw", "sys.hw")])),
        )
        .await;

        svc.initialize(DEADLINE).await.unwrap();
        assert_eq!(svc.state().await, ServiceState::Initialized);

        let owners = svc.endpoint_owners().await;
        assert_eq!(owners.len(), 2);
        assert_eq!(owners["web01.sys.facts"], PathBuf::from("/s/facts.sh"));
        assert_eq!(owners["web01.sys.hw"], PathBuf::from("/s/hw.sh"));
    }

    #[tokio::test]
    async fn duplicate_subject_keeps_first_writer() {
        let events = EventBus::default();
        let svc = ManagedService::new(
            "Sys",
            SubjectRewriter::new("web01"),
            events.clone(),
            Duration::from_secs(5),
        );
        let mut rx = events.subscribe();

        svc.add_script(
            "/s/facts.sh",
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")])),
        )
        .await;
        svc.add_script(
            "/s/dup.sh",
            MockRunner::describing("/s/dup.sh", descriptor("Sys", &[("Dup", "sys.facts")])),
        )
        .await;

        svc.initialize(DEADLINE).await.unwrap();

        let owners = svc.endpoint_owners().await;
        assert_eq!(owners.len(), 1);
        assert_eq!(owners["web01.sys.facts"], PathBuf::from("/s/facts.sh"));

        let dropped = rx.recv().await.unwrap();
        assert_eq!(dropped.kind, EventKind::EndpointDropped);
        assert_eq!(dropped.subject.as_deref(), Some("web01.sys.facts"));
    }

    #[tokio::test]
    async fn removal_promotes_later_claimant_on_reinitialize() {
        let svc = service();
        svc.add_script(
            "/s/facts.sh",
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")])),
        )
        .await;
        svc.add_script(
            "/s/dup.sh",
            MockRunner::describing("/s/dup.sh", descriptor("Sys", &[("Dup", "sys.facts")])),
        )
        .await;
        svc.initialize(DEADLINE).await.unwrap();

        let remaining = svc.remove_script(Path::new("/s/facts.sh")).await;
        assert_eq!(remaining, 1);

        svc.initialize(DEADLINE).await.unwrap();
        let owners = svc.endpoint_owners().await;
        assert_eq!(owners["web01.sys.facts"], PathBuf::from("/s/dup.sh"));
    }

    #[tokio::test]
    async fn name_mismatch_is_skipped_not_fatal() {
        let svc = service();
        svc.add_script(
            "/s/facts.sh",
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")])),
        )
        .await;
        svc.add_script(
            "/s/other.sh",
            MockRunner::describing("/s/other.sh", descriptor("Other", &[("X", "other.x")])),
        )
        .await;

        svc.initialize(DEADLINE).await.unwrap();
        let owners = svc.endpoint_owners().await;
        assert_eq!(owners.len(), 1);
        assert!(owners.contains_key("web01.sys.facts"));
        // The mismatched script remains a member.
        assert_eq!(svc.script_count().await, 2);
    }

    #[tokio::test]
    async fn probe_failure_skips_script_but_siblings_proceed() {
        let svc = service();
        svc.add_script("/s/bad.sh", MockRunner::failing_probe("/s/bad.sh")).await;
        svc.add_script(
            "/s/facts.sh",
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")])),
        )
        .await;

        svc.initialize(DEADLINE).await.unwrap();
        assert_eq!(svc.endpoint_owners().await.len(), 1);
    }

    #[tokio::test]
    async fn initialize_fails_without_scripts() {
        let svc = service();
        let err = svc.initialize(DEADLINE).await.unwrap_err();
        assert_eq!(err.as_label(), "service_no_scripts");
    }

    #[tokio::test]
    async fn initialize_fails_when_nothing_usable_remains() {
        let svc = service();
        svc.add_script("/s/bad.sh", MockRunner::failing_probe("/s/bad.sh")).await;
        let err = svc.initialize(DEADLINE).await.unwrap_err();
        assert_eq!(err.as_label(), "service_no_endpoints");
        assert_eq!(svc.state().await, ServiceState::Failed);
    }

    #[tokio::test]
    async fn dispatch_routes_with_declared_subject() {
        let svc = service();
        let runner =
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")]))
                .with_reply(0, b"result-bytes", b"");
        svc.add_script("/s/facts.sh", Arc::clone(&runner) as Arc<dyn ScriptRunner>)
            .await;
        svc.initialize(DEADLINE).await.unwrap();

        let req = MockRequest::new("web01.sys.facts", br#"{"n":"A"}"#);
        svc.dispatch(&req).await;

        assert_eq!(
            runner.last_subject.lock().unwrap().as_deref(),
            Some("sys.facts")
        );
        assert_eq!(
            runner.last_payload.lock().unwrap().as_deref(),
            Some(br#"{"n":"A"}"#.as_slice())
        );
        assert_eq!(req.reply(), Some(Ok(b"result-bytes".to_vec())));
    }

    #[tokio::test]
    async fn dispatch_unknown_subject_replies_error() {
        let svc = service();
        svc.add_script(
            "/s/facts.sh",
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")])),
        )
        .await;
        svc.initialize(DEADLINE).await.unwrap();

        let req = MockRequest::new("web01.sys.nope", b"");
        svc.dispatch(&req).await;
        let reply = req.reply().unwrap().unwrap_err();
        assert!(reply.contains("no handler"));
    }

    #[tokio::test]
    async fn dispatch_maps_nonzero_exit_to_bus_error() {
        let svc = service();
        let runner =
            MockRunner::describing("/s/facts.sh", descriptor("Sys", &[("Facts", "sys.facts")]))
                .with_reply(3, b"", b"disk on fire");
        svc.add_script("/s/facts.sh", runner as Arc<dyn ScriptRunner>).await;
        svc.initialize(DEADLINE).await.unwrap();

        let req = MockRequest::new("web01.sys.facts", b"");
        svc.dispatch(&req).await;
        let reply = req.reply().unwrap().unwrap_err();
        assert!(reply.contains("exit code 3"));
        assert!(reply.contains("disk on fire"));
    }

    #[test]
    fn bus_version_pads_bare_numerics() {
        assert_eq!(bus_version(""), "0.0.1");
        assert_eq!(bus_version("1"), "1.0.0");
        assert_eq!(bus_version("1.2"), "1.2.0");
        assert_eq!(bus_version("1.2.3"), "1.2.3");
        assert_eq!(bus_version("2.0.0-rc.1"), "2.0.0-rc.1");
    }
}
