//! One logical service on the bus.
//!
//! - [`ManagedService`] binds a service name to the scripts that claim it,
//!   merges their endpoints, registers on the bus, and dispatches requests.
//! - [`ServiceActor`] supervises one managed service's serve loop: restart
//!   on failure with backoff, give up after repeated failures.

mod actor;
mod managed;

pub use actor::{ActorExit, ServiceActor, MAX_SERVE_FAILURES};
pub use managed::{ManagedService, ServiceState};
