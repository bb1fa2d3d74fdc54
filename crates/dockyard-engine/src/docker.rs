//! Docker engine implementation backed by bollard

use async_trait::async_trait;
use crate::{
    ContainerSnapshot, ContainerSpec, Endpoint, Engine, EngineConfig, EngineError, ExecStatus,
    OutputChunk, OutputStream, PortBinding,
};
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions,
    ListContainersOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::{future, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info};

/// [`Engine`] talking to a Docker daemon
pub struct DockerEngine {
    /// Client handle
    docker: Docker,
    /// Host on which published ports are reachable
    host: String,
}

impl DockerEngine {
    /// Build a client for the configured endpoint.
    ///
    /// The client connects lazily; use [`Engine::ping`] to verify the
    /// daemon is reachable.
    pub fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        let endpoint = config.endpoint()?;
        let timeout = config.timeout.as_secs();

        debug!("Connecting to docker engine at {}", config.endpoint);

        let docker = match &endpoint {
            Endpoint::Unix(path) => {
                Docker::connect_with_socket(&path.to_string_lossy(), timeout, API_DEFAULT_VERSION)
            }
            Endpoint::Http { address, .. } => {
                Docker::connect_with_http(address, timeout, API_DEFAULT_VERSION)
            }
            Endpoint::Https { address, cert_path, .. } => Docker::connect_with_ssl(
                address,
                &cert_path.join("key.pem"),
                &cert_path.join("cert.pem"),
                &cert_path.join("ca.pem"),
                timeout,
                API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| {
            EngineError::Connection(format!(
                "Failed to create docker client for {}: {}",
                config.endpoint, e
            ))
        })?;

        Ok(Self::from_docker(docker, endpoint.host()))
    }

    /// Wrap an existing bollard client
    pub fn from_docker(docker: Docker, host: impl Into<String>) -> Self {
        Self {
            docker,
            host: host.into(),
        }
    }

    fn snapshot(id: &str, response: ContainerInspectResponse) -> ContainerSnapshot {
        let state = response.state.unwrap_or_default();
        let ports = response
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default()
            .into_iter()
            .map(|(port, bindings)| {
                let bindings = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|binding| {
                        let host_port = binding.host_port.as_deref()?.parse().ok()?;
                        Some(PortBinding {
                            host_ip: binding.host_ip,
                            host_port,
                        })
                    })
                    .collect();
                (port, bindings)
            })
            .collect();

        ContainerSnapshot {
            id: response.id.unwrap_or_else(|| id.to_string()),
            running: state.running.unwrap_or(false),
            status: state.status.map(|status| status.to_string()),
            ports,
        }
    }
}

/// Split `repo[:tag]` / `repo@digest` into the repository and tag/digest
/// parts, defaulting the tag to `latest`.
pub fn split_image_ref(image: &str) -> (&str, &str) {
    if let Some((repo, digest)) = image.split_once('@') {
        return (repo, digest);
    }

    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map_err(|e| EngineError::Connection(format!("Docker engine unreachable: {}", e)))?;
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        let (repo, tag) = split_image_ref(image);
        info!("Pulling image {}:{}", repo, tag);

        let options = CreateImageOptions {
            from_image: repo.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(update) = progress.next().await {
            let update = update?;
            if let Some(status) = update.status {
                debug!("Pull {}: {}", image, status);
            }
        }

        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .exposed_ports
            .iter()
            .map(|port| (port.clone(), HashMap::new()))
            .collect();

        let host_config = HostConfig {
            privileged: Some(spec.privileged),
            binds: Some(spec.binds.clone()),
            publish_all_ports: Some(spec.publish_all_ports),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let response = self.docker.create_container(options, config).await?;
        for warning in &response.warnings {
            debug!("Engine warning for {}: {}", response.id, warning);
        }

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerSnapshot, EngineError> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(Self::snapshot(id, response))
    }

    async fn kill_container(&self, id: &str) -> Result<(), EngineError> {
        match self
            .docker
            .kill_container(id, None::<KillContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 409, .. }) => {
                Err(EngineError::NotRunning(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<String>, EngineError> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn create_exec(&self, container_id: &str, command: &[String]) -> Result<String, EngineError> {
        let options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(command.to_vec()),
            ..Default::default()
        };
        let exec = self.docker.create_exec(container_id, options).await?;
        Ok(exec.id)
    }

    async fn start_exec(&self, exec_id: &str) -> Result<OutputStream, EngineError> {
        match self.docker.start_exec(exec_id, None).await? {
            StartExecResults::Attached { output, .. } => {
                let chunks = output.filter_map(|frame| {
                    future::ready(match frame {
                        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                            Some(Ok(OutputChunk::StdOut(message)))
                        }
                        Ok(LogOutput::StdErr { message }) => Some(Ok(OutputChunk::StdErr(message))),
                        Ok(LogOutput::StdIn { .. }) => None,
                        Err(e) => Some(Err(EngineError::from(e))),
                    })
                });
                Ok(Box::pin(chunks))
            }
            StartExecResults::Detached => Err(EngineError::Stream(format!(
                "Exec session {} started detached",
                exec_id
            ))),
        }
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecStatus, EngineError> {
        let response = self.docker.inspect_exec(exec_id).await?;
        Ok(ExecStatus {
            running: response.running.unwrap_or(false),
            exit_code: response.exit_code,
        })
    }

    fn host(&self) -> &str {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerState, NetworkSettings};

    #[test]
    fn test_split_image_ref() {
        let cases = vec![
            ("alpine", ("alpine", "latest")),
            ("alpine:3.19", ("alpine", "3.19")),
            ("localhost:5000/team/app", ("localhost:5000/team/app", "latest")),
            ("localhost:5000/team/app:1.2", ("localhost:5000/team/app", "1.2")),
            ("busybox@sha256:abcd", ("busybox", "sha256:abcd")),
        ];

        for (image, expected) in cases {
            assert_eq!(split_image_ref(image), expected, "Failed for image: {}", image);
        }
    }

    #[test]
    fn test_connect_rejects_bad_endpoint() {
        let config = EngineConfig::new("ftp://127.0.0.1:21");
        assert!(matches!(
            DockerEngine::connect(&config),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_snapshot_conversion() {
        let mut ports = HashMap::new();
        ports.insert(
            "80/tcp".to_string(),
            Some(vec![
                bollard::models::PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some("32768".to_string()),
                },
                bollard::models::PortBinding {
                    host_ip: Some("::".to_string()),
                    host_port: Some("32768".to_string()),
                },
            ]),
        );
        ports.insert("9000/tcp".to_string(), None);

        let response = ContainerInspectResponse {
            id: Some("abc123".to_string()),
            state: Some(ContainerState {
                running: Some(true),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        };

        let snapshot = DockerEngine::snapshot("abc", response);
        assert_eq!(snapshot.id, "abc123");
        assert!(snapshot.running);
        assert_eq!(snapshot.ports["80/tcp"].len(), 2);
        assert_eq!(snapshot.host_binding("80/tcp").unwrap().host_port, 32768);
        assert!(snapshot.ports["9000/tcp"].is_empty());
    }

    #[test]
    fn test_snapshot_without_state() {
        let snapshot = DockerEngine::snapshot("abc", ContainerInspectResponse::default());
        assert_eq!(snapshot.id, "abc");
        assert!(!snapshot.running);
        assert!(snapshot.ports.is_empty());
    }
}
