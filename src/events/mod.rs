//! Lifecycle events: types, broadcast bus, and log listener.
//!
//! This module groups the event **data model**, the **bus** used to
//! publish/subscribe to lifecycle events emitted by the supervisor and
//! service actors, and the **listener** that turns those events into
//! structured log records.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`EventBus`] thin wrapper over `tokio::sync::broadcast`
//! - [`spawn_log_listener`] background task draining the bus into `tracing`
//!
//! ## Quick reference
//! - **Publishers**: `ServiceManager` (admission/removal/discovery),
//!   `ServiceActor` (serve attempts, backoff, terminal states),
//!   `ManagedService` (merge diagnostics), `Daemon` (shutdown phases).
//! - **Consumers**: the log listener; tests subscribe directly to assert on
//!   lifecycle transitions.

mod bus;
mod event;
mod log;

pub use bus::EventBus;
pub use event::{Event, EventKind};
pub use log::spawn_log_listener;
