//! # shellvisor
//!
//! **Shellvisor** turns executable shell scripts on a local filesystem into
//! first-class microservices on a NATS request/reply bus.
//!
//! Drop a script into the watched directory and the daemon probes it for a
//! self-description, registers its endpoints on the bus, and routes each
//! inbound request to an invocation of that script — stdout comes back as
//! the reply. Scripts are added, restarted, and removed automatically as the
//! filesystem changes.
//!
//! ## Features
//!
//! | Area                | Description                                                       | Key types / traits                       |
//! |---------------------|-------------------------------------------------------------------|------------------------------------------|
//! | **Descriptors**     | Parse and validate the JSON self-description scripts emit.        | [`ServiceDescriptor`], [`Endpoint`]      |
//! | **Invocation**      | Probe and invoke scripts with deadlines and stream capture.       | [`ScriptRunner`], [`ScriptInvoker`]      |
//! | **Managed services**| Group scripts by service name, merge endpoints, serve requests.   | [`ManagedService`], [`ServiceActor`]     |
//! | **Supervision**     | Discovery, watching, debouncing, polling, supervised restart.     | [`ServiceManager`]                       |
//! | **Rewriting**       | Namespace subjects per node with a host prefix.                   | [`SubjectRewriter`]                      |
//! | **Events**          | Lifecycle event bus feeding structured logs.                      | [`Event`], [`EventKind`], [`EventBus`]   |
//! | **Errors**          | Typed errors for runtime and script failures.                     | [`RuntimeError`], [`ScriptError`]        |
//!
//! ## The script contract
//!
//! A script earns its endpoints by behavior alone:
//! - `script.sh info` must print a JSON [`ServiceDescriptor`] and exit 0
//!   within the describe deadline;
//! - `script.sh <declared-subject>` receives the request payload on stdin
//!   and prints the reply bytes to stdout, exiting 0 on success.
//!
//! ```no_run
//! use shellvisor::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(std::path::Path::new("config.toml"))?;
//!     let client = async_nats::connect(&config.bus_url).await?;
//!     Daemon::new(config, client).run().await?;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod config;
pub mod daemon;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod policies;
pub mod script;
pub mod service;
pub mod shutdown;
pub mod subject;
pub mod supervisor;

// ---- Public re-exports ----

pub use config::{Config, HostId};
pub use daemon::Daemon;
pub use descriptor::{DescriptorError, Endpoint, ServiceDescriptor};
pub use error::{RuntimeError, ScriptError};
pub use events::{Event, EventBus, EventKind};
pub use script::{ExecutionRecord, ScriptInvoker, ScriptRunner};
pub use service::{ManagedService, ServiceActor, ServiceState};
pub use subject::SubjectRewriter;
pub use supervisor::ServiceManager;
