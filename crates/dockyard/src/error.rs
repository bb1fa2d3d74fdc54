//! Error types for the Dockyard library

use dockyard_engine::EngineError;
use thiserror::Error;
use std::time::Duration;

/// Main error type for fixture operations
#[derive(Debug, Error)]
pub enum FixtureError {
    /// No engine connection configuration was found
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Engine could not be reached
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Container never reached the running state; it has been removed
    #[error("Failed to start docker image {image} after {timeout:?}")]
    StartTimeout {
        /// Image that failed to start
        image: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Command inside the container exited non-zero
    #[error("Command `{command}` failed with exit code {exit_code}: {output}")]
    ExecutionFailure {
        /// Command line that was executed
        command: String,
        /// Exit code reported by the engine
        exit_code: i64,
        /// Trimmed combined stdout/stderr
        output: String,
    },

    /// Command did not finish within the caller-supplied deadline
    #[error("Command `{command}` timed out after {timeout:?}")]
    ExecTimeout {
        /// Command line that was executed
        command: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Engine rejected kill/remove during teardown
    #[error("Failed to tear down container {container_id}: {source}")]
    Teardown {
        /// Container being torn down
        container_id: String,
        /// Underlying engine failure
        #[source]
        source: EngineError,
    },

    /// Operation needs a running container
    #[error("Container is not running")]
    NotRunning,

    /// Port was never exposed or has no host binding
    #[error("Port {0} is not exposed")]
    PortNotExposed(String),

    /// Fixture was already started; fixtures are single-use
    #[error("Fixture already started")]
    AlreadyStarted,

    /// Any other engine failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixtureError {
    /// Captured command output for execution failures
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailure { output, .. } => Some(output),
            _ => None,
        }
    }
}
