//! Handle to a started container

use crate::exec::{self, ExecOutput};
use crate::{FixtureError, Result};
use dockyard_engine::{ContainerSnapshot, Engine};
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

/// A container between a successful start and teardown.
///
/// Cheap to clone; clones share the engine connection and the last
/// inspection snapshot, so a [`refresh`](Self::refresh) through any clone
/// is seen by all of them.
#[derive(Clone)]
pub struct RunningContainer {
    /// Engine the container lives on
    engine: Arc<dyn Engine>,
    /// Container id
    id: Arc<str>,
    /// Last inspection result
    snapshot: Arc<RwLock<ContainerSnapshot>>,
    /// Mirror exec output to stdout
    mirror_output: bool,
}

impl RunningContainer {
    pub(crate) fn new(engine: Arc<dyn Engine>, snapshot: ContainerSnapshot, mirror_output: bool) -> Self {
        Self {
            engine,
            id: Arc::from(snapshot.id.as_str()),
            snapshot: Arc::new(RwLock::new(snapshot)),
            mirror_output,
        }
    }

    /// Container id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the last inspection snapshot
    pub fn snapshot(&self) -> ContainerSnapshot {
        self.read_snapshot().clone()
    }

    /// Re-inspect the container, replacing the shared snapshot
    pub async fn refresh(&self) -> Result<ContainerSnapshot> {
        let snapshot = self.engine.inspect_container(&self.id).await?;
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        Ok(snapshot)
    }

    // Writers only swap whole snapshots, so poisoning is ignored
    fn read_snapshot(&self) -> RwLockReadGuard<'_, ContainerSnapshot> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Host address for a container port (`5432/tcp`).
    ///
    /// Only the first host binding is used. The engine host is resolved
    /// only when it is a name rather than an IP address.
    pub fn target(&self, port: &str) -> Result<SocketAddr> {
        let host_port = self
            .read_snapshot()
            .host_binding(port)
            .map(|binding| binding.host_port)
            .ok_or_else(|| FixtureError::PortNotExposed(port.to_string()))?;

        let host = self.engine.host();
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, host_port));
        }

        (host, host_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                FixtureError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Engine host '{}' did not resolve", host),
                ))
            })
    }

    /// Execute a command, returning its combined output.
    ///
    /// A non-zero exit becomes [`FixtureError::ExecutionFailure`] carrying
    /// the trimmed output. There is no deadline; see
    /// [`execute_with_timeout`](Self::execute_with_timeout).
    pub async fn execute(&self, command: &[&str]) -> Result<String> {
        let command = to_owned_command(command);
        self.run_exec(&command).await?.into_result(&command)
    }

    /// Execute a command, failing with [`FixtureError::ExecTimeout`] if it
    /// runs longer than `timeout`
    pub async fn execute_with_timeout(&self, command: &[&str], timeout: Duration) -> Result<String> {
        let command = to_owned_command(command);
        match tokio::time::timeout(timeout, self.run_exec(&command)).await {
            Ok(output) => output?.into_result(&command),
            Err(_) => Err(FixtureError::ExecTimeout {
                command: command.join(" "),
                timeout,
            }),
        }
    }

    /// Execute a command and return the raw result without checking the
    /// exit code
    pub async fn exec(&self, command: &[&str]) -> Result<ExecOutput> {
        self.run_exec(&to_owned_command(command)).await
    }

    async fn run_exec(&self, command: &[String]) -> Result<ExecOutput> {
        exec::run(self.engine.as_ref(), &self.id, command, self.mirror_output).await
    }
}

fn to_owned_command(command: &[&str]) -> Vec<String> {
    command.iter().map(|s| s.to_string()).collect()
}

impl fmt::Debug for RunningContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningContainer")
            .field("snapshot", &*self.read_snapshot())
            .field("host", &self.engine.host())
            .finish()
    }
}
