//! Script probing and invocation.
//!
//! A script is the unit of behavior behind every endpoint. This module is
//! the only place that spawns one:
//! - [`ScriptRunner`] the trait the rest of the daemon programs against
//!   (mockable in tests)
//! - [`ScriptInvoker`] the real implementation over `tokio::process`
//! - [`ExecutionRecord`] the always-produced outcome of a request invocation
//!
//! See `exec.rs` for the shared low-level spawn/deadline/terminate path.

mod exec;
mod invoker;

pub use invoker::{stderr_excerpt, ExecutionRecord, ScriptInvoker, ScriptRunner, DESCRIBE_DEADLINE};
