//! # Error types used by the daemon runtime and script invocations.
//!
//! Two error enums cover the two failure domains:
//!
//! - [`RuntimeError`] errors raised by the supervision runtime itself
//!   (configuration, bus registration, watcher setup).
//! - [`ScriptError`] errors raised while probing a script for its
//!   self-description.
//!
//! Request-side failures are not errors in this sense: executing a script for
//! a request always yields an [`ExecutionRecord`](crate::script::ExecutionRecord),
//! which the owning service maps to a bus reply or a bus error response.
//!
//! Both enums provide `as_label()` for stable snake_case log fields.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the supervision runtime.
///
/// Only [`RuntimeError::Config`] and watcher setup failures terminate the
/// daemon; everything else is absorbed by the supervisor's restart discipline.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration is missing required keys or carries invalid values.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Human-readable explanation of what is wrong.
        reason: String,
    },

    /// A managed service was asked to initialize with an empty script set.
    #[error("service '{service}' has no scripts")]
    NoScripts {
        /// The logical service name.
        service: String,
    },

    /// Initialization produced an empty endpoint set (every member probe
    /// failed or every descriptor was skipped).
    #[error("service '{service}' produced no usable endpoints")]
    NoEndpoints {
        /// The logical service name.
        service: String,
    },

    /// The bus rejected the service or one of its endpoints.
    #[error("failed to register service '{service}' on the bus: {reason}")]
    BusRegistration {
        /// The logical service name.
        service: String,
        /// The bus client's explanation.
        reason: String,
    },

    /// The scripts directory exists but could not be read during discovery.
    #[error("failed to scan scripts directory {path:?}: {reason}")]
    Discovery {
        /// Directory that could not be scanned.
        path: PathBuf,
        /// The filesystem's explanation.
        reason: String,
    },

    /// The filesystem watcher could not be installed on the scripts directory.
    #[error("failed to watch {path:?}: {reason}")]
    Watch {
        /// Directory that could not be watched.
        path: PathBuf,
        /// The watcher backend's explanation.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for structured log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config { .. } => "config_invalid",
            RuntimeError::NoScripts { .. } => "service_no_scripts",
            RuntimeError::NoEndpoints { .. } => "service_no_endpoints",
            RuntimeError::BusRegistration { .. } => "bus_registration_failed",
            RuntimeError::Discovery { .. } => "discovery_failed",
            RuntimeError::Watch { .. } => "watch_failed",
        }
    }
}

/// Errors produced while probing a script (the `info` invocation).
///
/// A script that fails its probe is never admitted into a managed service.
/// [`ScriptError::Unavailable`] additionally doubles as the removal signal
/// when a previously admitted script stops being executable.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script exited 0 but its output failed to parse or validate.
    #[error("script {path:?} produced an invalid descriptor: {reason}")]
    InvalidDescriptor {
        /// The script's filesystem path.
        path: PathBuf,
        /// Parse or validation failure detail.
        reason: String,
    },

    /// The script exited non-zero during the probe.
    #[error("probe of {path:?} failed: {stderr}")]
    ProbeFailed {
        /// The script's filesystem path.
        path: PathBuf,
        /// Captured standard error, truncated to a bounded prefix.
        stderr: String,
    },

    /// The script could not be launched (missing, not executable).
    #[error("script {path:?} cannot be executed: {source}")]
    Unavailable {
        /// The script's filesystem path.
        path: PathBuf,
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// The probe deadline elapsed before the script exited.
    #[error("script {path:?} timed out after {deadline:?}")]
    Timeout {
        /// The script's filesystem path.
        path: PathBuf,
        /// The deadline that was exceeded.
        deadline: Duration,
    },
}

impl ScriptError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScriptError::InvalidDescriptor { .. } => "invalid_descriptor",
            ScriptError::ProbeFailed { .. } => "probe_failed",
            ScriptError::Unavailable { .. } => "unavailable",
            ScriptError::Timeout { .. } => "timeout",
        }
    }

    /// True when the script cannot be executed at all.
    ///
    /// On change notifications this is treated as removal rather than a
    /// transient probe failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ScriptError::Unavailable { .. })
    }
}
