//! Engine abstraction and request/response types

use async_trait::async_trait;
use crate::EngineError;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

/// Live output of an exec session
pub type OutputStream = Pin<Box<dyn Stream<Item = Result<OutputChunk, EngineError>> + Send>>;

/// Container engine operations used by fixtures
#[async_trait]
pub trait Engine: Send + Sync {
    /// Check that the engine answers
    async fn ping(&self) -> Result<(), EngineError>;

    /// Pull an image (`name:tag`) into the local store
    async fn pull_image(&self, image: &str) -> Result<(), EngineError>;

    /// Create a container, returning its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    /// Start a created container
    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Inspect a container's state and port bindings
    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, EngineError>;

    /// Kill a running container. Fails with [`EngineError::NotRunning`]
    /// when the container has already stopped.
    async fn kill_container(&self, id: &str) -> Result<(), EngineError>;

    /// Remove a container
    async fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError>;

    /// Ids of all containers, running or not
    async fn list_containers(&self) -> Result<Vec<String>, EngineError>;

    /// Create an exec session attached to stdout and stderr, returning its id
    async fn create_exec(&self, container_id: &str, command: &[String]) -> Result<String, EngineError>;

    /// Start an exec session and return its output
    async fn start_exec(&self, exec_id: &str) -> Result<OutputStream, EngineError>;

    /// Inspect an exec session
    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecStatus, EngineError>;

    /// Host on which published ports are reachable
    fn host(&self) -> &str;
}

/// Container creation request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name, if any
    pub name: Option<String>,
    /// Image reference
    pub image: String,
    /// Command overriding the image default, if non-empty
    pub command: Vec<String>,
    /// `KEY=VALUE` assignments
    pub env: Vec<String>,
    /// Port specifiers to expose (`80/tcp`)
    pub exposed_ports: Vec<String>,
    /// Bind-mount specifiers (`/host:/container[:ro]`)
    pub binds: Vec<String>,
    /// Run privileged
    pub privileged: bool,
    /// Publish every exposed port on an engine-chosen host port
    pub publish_all_ports: bool,
}

/// A single host-side binding of a container port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Host interface the port is bound on
    pub host_ip: Option<String>,
    /// Host port
    pub host_port: u16,
}

/// Result of a container inspection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSnapshot {
    /// Container id
    pub id: String,
    /// Whether the container is running
    pub running: bool,
    /// Engine status text (`created`, `running`, `exited`, ...)
    pub status: Option<String>,
    /// Host bindings keyed by container port specifier (`80/tcp`)
    pub ports: HashMap<String, Vec<PortBinding>>,
}

impl ContainerSnapshot {
    /// First host binding for a container port.
    ///
    /// A bare port number also matches its `/tcp` form, which is how the
    /// engine normalizes unqualified specifiers.
    pub fn host_binding(&self, port: &str) -> Option<&PortBinding> {
        let bindings = match self.ports.get(port) {
            Some(bindings) => Some(bindings),
            None if !port.contains('/') => self.ports.get(&format!("{}/tcp", port)),
            None => None,
        };
        bindings.and_then(|b| b.first())
    }
}

/// A frame of exec output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    /// Standard output bytes
    StdOut(Bytes),
    /// Standard error bytes
    StdErr(Bytes),
}

impl OutputChunk {
    /// Raw bytes of the frame
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::StdOut(b) | Self::StdErr(b) => b,
        }
    }
}

/// State of an exec session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStatus {
    /// Whether the command is still running
    pub running: bool,
    /// Exit code, once finished
    pub exit_code: Option<i64>,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.running, self.exit_code) {
            (true, _) => write!(f, "running"),
            (false, Some(code)) => write!(f, "exited with {}", code),
            (false, None) => write!(f, "exited"),
        }
    }
}
