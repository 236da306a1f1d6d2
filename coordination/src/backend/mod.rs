//! Execution backend contract.
//!
//! An execution backend owns isolated, long-running environments addressed
//! by an opaque [`EnvironmentHandle`]. Every agent lives in exactly one
//! environment for its whole lifetime; stopping and starting it keeps the
//! handle.
//!
//! `run` reports the exit code of the invoked command as data. Only failures
//! of the backend itself (unknown handle, unreachable daemon, rejected
//! request) are [`BackendError`]s.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{InMemoryBackend, Invocation};

/// Opaque reference to an execution environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentHandle(String);

impl EnvironmentHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live state of an environment as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    Running,
    Stopped,
    /// The backend has no environment for this handle.
    Missing,
}

impl EnvironmentStatus {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Missing => write!(f, "not found"),
        }
    }
}

/// A named volume bound into an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Backend-side volume name.
    pub volume: String,
    /// Mount point inside the environment.
    pub target: String,
    pub read_only: bool,
}

impl VolumeMount {
    pub fn read_write(volume: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            target: target.into(),
            read_only: false,
        }
    }
}

/// Everything needed to create one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    /// Human-readable environment name (unique per backend).
    pub name: String,
    /// Image reference the environment is created from.
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<VolumeMount>,
    pub working_dir: String,
    /// Keep-alive command the environment idles on.
    pub command: Vec<String>,
}

/// Result of a command run inside an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub exit_code: i64,
    /// Combined stdout and stderr, lossily decoded.
    pub output: String,
}

impl RunOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
        }
    }

    pub fn failure(exit_code: i64, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures of the backend itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The targeted handle does not exist.
    #[error("Environment {handle} not found")]
    NotFound { handle: String },

    /// The backend could not be reached at all.
    #[error("Execution backend unavailable: {message}")]
    Unavailable { message: String },

    /// The backend answered but refused the request.
    #[error("{operation} rejected by execution backend: {message}")]
    Rejected { operation: String, message: String },
}

impl BackendError {
    pub fn not_found(handle: impl Into<String>) -> Self {
        Self::NotFound {
            handle: handle.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Create/start/stop/remove/run/status over isolated environments.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short backend label for logs.
    fn name(&self) -> &str;

    /// Probe that the backend is reachable.
    async fn ping(&self) -> BackendResult<()>;

    /// Create a new (not yet started) environment.
    async fn create_environment(&self, spec: &EnvironmentSpec) -> BackendResult<EnvironmentHandle>;

    async fn start_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()>;

    async fn stop_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()>;

    async fn remove_environment(&self, handle: &EnvironmentHandle) -> BackendResult<()>;

    /// Run `command` inside the environment. A non-zero exit is `Ok`.
    async fn run(
        &self,
        handle: &EnvironmentHandle,
        command: &[String],
        env: &BTreeMap<String, String>,
    ) -> BackendResult<RunOutput>;

    /// Live status; an unknown handle is `Missing`, not an error.
    async fn status(&self, handle: &EnvironmentHandle) -> BackendResult<EnvironmentStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_matches_listing_vocabulary() {
        assert_eq!(EnvironmentStatus::Running.to_string(), "running");
        assert_eq!(EnvironmentStatus::Stopped.to_string(), "stopped");
        assert_eq!(EnvironmentStatus::Missing.to_string(), "not found");
    }

    #[test]
    fn test_run_output_success() {
        assert!(RunOutput::success("ok").is_success());
        assert!(!RunOutput::failure(2, "boom").is_success());
    }

    #[test]
    fn test_handle_serializes_as_plain_string() {
        let handle = EnvironmentHandle::new("0123456789ab");
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"0123456789ab\"");
    }
}
