//! # Script probe and request invocation.
//!
//! A script satisfies exactly one behavioral contract:
//! - invoked with the single argument `info`, it prints a JSON service
//!   descriptor to stdout and exits 0;
//! - invoked with any other single argument — a declared subject — it reads
//!   the request payload from stdin and prints the reply bytes to stdout,
//!   exiting 0 on success.
//!
//! [`ScriptInvoker`] turns those invocations into typed outcomes with precise
//! failure semantics. [`ScriptRunner`] is the trait seam the managed service
//! and supervisor program against, so tests can substitute scripted fakes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::descriptor::ServiceDescriptor;
use crate::error::ScriptError;
use crate::script::exec::{run_with_deadline, RawExec};

/// Default deadline for the `info` probe.
pub const DESCRIBE_DEADLINE: Duration = Duration::from_secs(5);

/// Longest stderr prefix carried in errors and bus error replies.
const STDERR_EXCERPT_MAX: usize = 1024;

/// Outcome of one request invocation.
///
/// Every invocation produces a record; only [`ExecutionRecord::Ok`] yields a
/// reply on the bus, the other variants become bus error responses.
#[derive(Debug)]
pub enum ExecutionRecord {
    /// Exit 0. Stdout is the reply; stderr is kept for logging.
    Ok { stdout: Vec<u8>, stderr: Vec<u8> },
    /// Non-zero exit, both streams captured.
    ScriptFailed {
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// Deadline exceeded; the process has been terminated.
    Timeout { deadline: Duration },
    /// The script could not be launched.
    SpawnFailed { error: String },
}

impl ExecutionRecord {
    /// Returns a short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionRecord::Ok { .. } => "ok",
            ExecutionRecord::ScriptFailed { .. } => "script_failed",
            ExecutionRecord::Timeout { .. } => "timeout",
            ExecutionRecord::SpawnFailed { .. } => "spawn_failed",
        }
    }
}

/// Behavioral handle to one script on disk.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// The script's filesystem path.
    fn path(&self) -> &Path;

    /// Runs the `info` probe and returns the parsed, validated descriptor.
    async fn describe(&self, deadline: Duration) -> Result<ServiceDescriptor, ScriptError>;

    /// Runs one request: declared subject as the argument, payload on stdin.
    async fn handle(&self, subject: &str, payload: &[u8], deadline: Duration) -> ExecutionRecord;
}

/// The real [`ScriptRunner`] over `tokio::process`.
#[derive(Debug, Clone)]
pub struct ScriptInvoker {
    path: PathBuf,
}

impl ScriptInvoker {
    /// Creates an invoker for the script at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ScriptRunner for ScriptInvoker {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn describe(&self, deadline: Duration) -> Result<ServiceDescriptor, ScriptError> {
        match run_with_deadline(&self.path, "info", None, deadline).await {
            RawExec::SpawnError(e) => Err(ScriptError::Unavailable {
                path: self.path.clone(),
                source: e,
            }),
            RawExec::TimedOut => Err(ScriptError::Timeout {
                path: self.path.clone(),
                deadline,
            }),
            RawExec::Completed { status, stderr, .. } if !status.success() => {
                Err(ScriptError::ProbeFailed {
                    path: self.path.clone(),
                    stderr: stderr_excerpt(&stderr),
                })
            }
            RawExec::Completed { stdout, .. } => {
                let descriptor =
                    ServiceDescriptor::parse(&stdout).map_err(|e| ScriptError::InvalidDescriptor {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?;
                descriptor
                    .validate()
                    .map_err(|e| ScriptError::InvalidDescriptor {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(descriptor)
            }
        }
    }

    async fn handle(&self, subject: &str, payload: &[u8], deadline: Duration) -> ExecutionRecord {
        match run_with_deadline(&self.path, subject, Some(payload.to_vec()), deadline).await {
            RawExec::SpawnError(e) => ExecutionRecord::SpawnFailed {
                error: e.to_string(),
            },
            RawExec::TimedOut => ExecutionRecord::Timeout { deadline },
            RawExec::Completed {
                status,
                stdout,
                stderr,
            } => {
                if status.success() {
                    ExecutionRecord::Ok { stdout, stderr }
                } else {
                    ExecutionRecord::ScriptFailed {
                        exit_code: status.code().unwrap_or(-1),
                        stdout,
                        stderr,
                    }
                }
            }
        }
    }
}

/// Lossy, bounded rendering of captured stderr for errors and replies.
pub fn stderr_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_EXCERPT_MAX {
        return trimmed.to_string();
    }
    let mut cut = STDERR_EXCERPT_MAX;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}
