//! Fixture configuration

use dockyard_engine::ContainerSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything needed to create the fixture's container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Image reference
    pub image: String,
    /// Command overriding the image default
    #[serde(default)]
    pub command: Vec<String>,
    /// `KEY=VALUE` assignments
    #[serde(default)]
    pub env: BTreeSet<String>,
    /// Port specifiers to expose
    #[serde(default)]
    pub exposed_ports: BTreeSet<String>,
    /// Bind-mount specifiers, in order
    #[serde(default)]
    pub binds: Vec<String>,
    /// Run the container privileged
    #[serde(default)]
    pub privileged: bool,
    /// Pull the image before creating the container
    #[serde(default)]
    pub pull_image: bool,
    /// Mirror exec output to stdout
    #[serde(default = "default_mirror_output")]
    pub mirror_output: bool,
}

fn default_mirror_output() -> bool {
    true
}

impl FixtureConfig {
    /// Create a configuration for the given image
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: Vec::new(),
            env: BTreeSet::new(),
            exposed_ports: BTreeSet::new(),
            binds: Vec::new(),
            privileged: false,
            pull_image: false,
            mirror_output: true,
        }
    }

    /// Override the image's default command
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env.insert(format!("{}={}", key.as_ref(), value.as_ref()));
        self
    }

    /// Expose a container port (`5432/tcp`); it is published on an
    /// engine-chosen host port
    pub fn with_exposed_port(mut self, port: impl Into<String>) -> Self {
        self.exposed_ports.insert(port.into());
        self
    }

    /// Add a bind mount (`/host/path:/container/path[:ro]`)
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.binds.push(bind.into());
        self
    }

    /// Run the container privileged
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Pull the image before creating the container
    pub fn with_pull_image(mut self, pull: bool) -> Self {
        self.pull_image = pull;
        self
    }

    /// Mirror exec output to stdout
    pub fn with_mirror_output(mut self, mirror: bool) -> Self {
        self.mirror_output = mirror;
        self
    }

    /// Engine create request for this configuration.
    /// Every exposed port is always published.
    pub fn container_spec(&self, name: Option<String>) -> ContainerSpec {
        ContainerSpec {
            name,
            image: self.image.clone(),
            command: self.command.clone(),
            env: self.env.iter().cloned().collect(),
            exposed_ports: self.exposed_ports.iter().cloned().collect(),
            binds: self.binds.clone(),
            privileged: self.privileged,
            publish_all_ports: true,
        }
    }
}
