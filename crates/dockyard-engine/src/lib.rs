//! # Dockyard Engine
//!
//! Container engine access layer for Dockyard: connection configuration,
//! the [`Engine`] abstraction, and its Docker implementation.

#![warn(missing_docs)]

/// Engine abstraction and request/response types
pub mod engine;

/// Connection configuration and endpoint parsing
pub mod config;

/// Docker implementation over bollard
pub mod docker;

/// Engine-specific error types
pub mod error;

pub use engine::{
    ContainerSnapshot, ContainerSpec, Engine, ExecStatus, OutputChunk, OutputStream, PortBinding,
};
pub use config::{EngineConfig, Endpoint};
pub use docker::DockerEngine;
pub use error::EngineError;
