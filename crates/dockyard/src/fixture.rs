//! Container lifecycle fixture

use crate::{FixtureConfig, FixtureError, Result, RunningContainer};
use dockyard_engine::{ContainerSnapshot, DockerEngine, Engine, EngineConfig, EngineError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Interval between inspections while waiting for the container to run
pub const START_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Inspections before giving up on a container (60s at the poll interval)
pub const START_POLL_ATTEMPTS: u32 = 600;

/// Fixture lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureState {
    /// Not started yet
    Configuring,
    /// Container is being created and started
    Starting,
    /// Container is running
    Running,
    /// Container has been torn down
    Stopped,
    /// Start failed
    Failed(String),
}

/// Starts a container for a test and tears it down afterwards.
///
/// A fixture manages at most one container and is single-use.
pub struct ContainerFixture {
    /// Container configuration
    config: FixtureConfig,
    /// Connection parameters, used if no engine was supplied
    engine_config: Option<EngineConfig>,
    /// Connected engine
    engine: Option<Arc<dyn Engine>>,
    /// Lifecycle state
    state: FixtureState,
    /// Id of the created container, until it is removed
    container_id: Option<String>,
    /// Set between a successful start and teardown
    running: Option<RunningContainer>,
}

impl ContainerFixture {
    /// Create a fixture that connects to the engine during [`start`](Self::start)
    pub fn new(config: FixtureConfig, engine_config: EngineConfig) -> Self {
        Self {
            config,
            engine_config: Some(engine_config),
            engine: None,
            state: FixtureState::Configuring,
            container_id: None,
            running: None,
        }
    }

    /// Create a fixture using the engine configuration from the environment
    pub fn from_env(config: FixtureConfig) -> Result<Self> {
        let engine_config = EngineConfig::from_env().map_err(connect_error)?;
        Ok(Self::new(config, engine_config))
    }

    /// Create a fixture on an already constructed engine
    pub fn with_engine(config: FixtureConfig, engine: Arc<dyn Engine>) -> Self {
        Self {
            config,
            engine_config: None,
            engine: Some(engine),
            state: FixtureState::Configuring,
            container_id: None,
            running: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> &FixtureState {
        &self.state
    }

    /// Id of the managed container, if one exists
    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    /// The running container
    pub fn container(&self) -> Result<&RunningContainer> {
        self.running.as_ref().ok_or(FixtureError::NotRunning)
    }

    /// Re-inspect the container, updating the snapshot seen by every handle
    pub async fn refresh(&self) -> Result<ContainerSnapshot> {
        self.container()?.refresh().await
    }

    /// Host address for a container port
    pub fn target(&self, port: &str) -> Result<SocketAddr> {
        self.container()?.target(port)
    }

    /// Execute a command in the container, returning its output
    pub async fn execute(&self, command: &[&str]) -> Result<String> {
        self.container()?.execute(command).await
    }

    /// Execute a command with a deadline
    pub async fn execute_with_timeout(&self, command: &[&str], timeout: Duration) -> Result<String> {
        self.container()?.execute_with_timeout(command, timeout).await
    }

    /// Create and start the container, waiting until it runs.
    ///
    /// On failure after creation the container is force-removed before the
    /// error is returned.
    pub async fn start(&mut self) -> Result<&RunningContainer> {
        if self.state != FixtureState::Configuring {
            return Err(FixtureError::AlreadyStarted);
        }

        self.state = FixtureState::Starting;

        match self.start_container().await {
            Ok(running) => {
                self.state = FixtureState::Running;
                Ok(self.running.insert(running))
            }
            Err(e) => {
                self.state = FixtureState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn start_container(&mut self) -> Result<RunningContainer> {
        let engine = self.connect()?;

        engine
            .ping()
            .await
            .map_err(|e| FixtureError::Connectivity(e.to_string()))?;

        if self.config.pull_image {
            engine.pull_image(&self.config.image).await?;
        }

        let name = format!("dockyard-{}", Uuid::new_v4());
        let spec = self.config.container_spec(Some(name.clone()));
        let id = engine.create_container(&spec).await?;
        self.container_id = Some(id.clone());

        info!("Created docker container {} ({}) from {}", name, id, self.config.image);

        if let Err(e) = engine.start_container(&id).await {
            self.discard(engine.as_ref(), &id).await;
            return Err(e.into());
        }

        match Self::wait_until_running(engine.as_ref(), &id).await {
            Ok(Some(snapshot)) => Ok(RunningContainer::new(engine, snapshot, self.config.mirror_output)),
            Ok(None) => {
                self.discard(engine.as_ref(), &id).await;
                Err(FixtureError::StartTimeout {
                    image: self.config.image.clone(),
                    timeout: START_POLL_INTERVAL * START_POLL_ATTEMPTS,
                })
            }
            Err(e) => {
                self.discard(engine.as_ref(), &id).await;
                Err(e)
            }
        }
    }

    fn connect(&mut self) -> Result<Arc<dyn Engine>> {
        if let Some(engine) = &self.engine {
            return Ok(engine.clone());
        }

        let engine_config = self
            .engine_config
            .as_ref()
            .ok_or_else(|| FixtureError::Configuration("No engine configuration".to_string()))?;
        let engine: Arc<dyn Engine> = Arc::new(DockerEngine::connect(engine_config).map_err(connect_error)?);
        self.engine = Some(engine.clone());
        Ok(engine)
    }

    async fn wait_until_running(engine: &dyn Engine, id: &str) -> Result<Option<ContainerSnapshot>> {
        for attempt in 1..=START_POLL_ATTEMPTS {
            let snapshot = engine.inspect_container(id).await?;
            if snapshot.running {
                debug!("Container {} running after {} inspections", id, attempt);
                return Ok(Some(snapshot));
            }
            tokio::time::sleep(START_POLL_INTERVAL).await;
        }

        Ok(None)
    }

    /// Force-remove a container that failed to start
    async fn discard(&mut self, engine: &dyn Engine, id: &str) {
        match engine.remove_container(id, true).await {
            Ok(()) => {
                self.container_id = None;
            }
            Err(e) => {
                error!("Failed to remove container {} after failed start: {}", id, e);
            }
        }
    }

    /// Kill and force-remove the container.
    ///
    /// Safe to call in any state; does nothing when no container exists.
    /// A kill refused because the container already exited is ignored;
    /// every other engine failure is returned.
    pub async fn teardown(&mut self) -> Result<()> {
        self.running = None;
        if self.state == FixtureState::Running {
            self.state = FixtureState::Stopped;
        }

        let (Some(id), Some(engine)) = (self.container_id.clone(), self.engine.clone()) else {
            return Ok(());
        };

        info!("Shutting down docker container {}", id);

        let killed = match engine.kill_container(&id).await {
            Err(EngineError::NotRunning(_)) => {
                debug!("Container {} already stopped", id);
                Ok(())
            }
            other => other,
        };
        let removed = engine.remove_container(&id, true).await;

        if removed.is_ok() {
            self.container_id = None;
        }

        match (killed, removed) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(source), _) | (Ok(()), Err(source)) => Err(FixtureError::Teardown {
                container_id: id,
                source,
            }),
        }
    }

    /// Start the container, run `body` against it, then tear it down.
    ///
    /// Teardown runs whether or not `body` succeeds. A body error takes
    /// precedence over a teardown error, which is then logged.
    pub async fn run<F, Fut, T, E>(mut self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(RunningContainer) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<FixtureError>,
    {
        let container = match self.start().await {
            Ok(container) => container.clone(),
            Err(e) => {
                if let Err(teardown) = self.teardown().await {
                    error!("{}", teardown);
                }
                return Err(e.into());
            }
        };

        let result = body(container).await;
        let teardown = self.teardown().await;

        match (result, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown)) => {
                error!("{}", teardown);
                Err(e)
            }
        }
    }
}

fn connect_error(err: EngineError) -> FixtureError {
    match err {
        EngineError::Configuration(msg) => FixtureError::Configuration(msg),
        err if err.is_connection() => FixtureError::Connectivity(err.to_string()),
        other => FixtureError::Engine(other),
    }
}

impl Drop for ContainerFixture {
    fn drop(&mut self) {
        let (Some(id), Some(engine)) = (self.container_id.take(), self.engine.take()) else {
            return;
        };

        warn!("Container {} was not torn down, removing it in the background", id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = engine.remove_container(&id, true).await {
                        warn!("Failed to remove container {}: {}", id, e);
                    }
                });
            }
            Err(_) => {
                warn!("No tokio runtime available, container {} is left behind", id);
            }
        }
    }
}

impl std::fmt::Debug for ContainerFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerFixture")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("container_id", &self.container_id)
            .finish()
    }
}
