//! # Broadcast bus for lifecycle events.
//!
//! [`EventBus`] is a wrapper around [`tokio::sync::broadcast`] that lets the
//! supervisor, service actors, and managed services publish [`Event`]s to
//! any number of subscribers — the log listener in production, assertion
//! loops in tests.
//!
//! ## Key characteristics
//! - **Broadcast semantics**: every active subscriber receives a clone of
//!   each event
//! - **Non-persistent**: events published with no subscribers are dropped
//! - **Bounded capacity**: slow subscribers observe `Lagged` and skip ahead
//!
//! Not to be confused with the message bus the daemon serves on: this
//! channel never leaves the process.

use tokio::sync::broadcast;

use super::event::Event;

/// Default channel capacity; enough to absorb a discovery burst.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast channel for lifecycle events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no active subscribers the event is dropped silently;
    /// the daemon operates fine without observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
