//! # Dockyard
//!
//! Docker container fixtures for Rust integration tests.
//!
//! A [`ContainerFixture`] creates a container from a [`FixtureConfig`],
//! waits until it runs, exposes its published ports and an exec interface
//! to the test body, and removes it again at teardown.
//!
//! ```no_run
//! use dockyard::{ContainerFixture, FixtureConfig};
//!
//! # async fn example() -> dockyard::Result<()> {
//! let config = FixtureConfig::new("redis:7").with_exposed_port("6379/tcp");
//!
//! ContainerFixture::from_env(config)?
//!     .run(|redis| async move {
//!         let addr = redis.target("6379/tcp")?;
//!         let pong = redis.execute(&["redis-cli", "ping"]).await?;
//!         println!("{} answered {}", addr, pong.trim());
//!         Ok::<_, dockyard::FixtureError>(())
//!     })
//!     .await
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use dockyard_engine as engine;

/// Error types for the Dockyard library
pub mod error;

/// Fixture configuration
pub mod config;

/// Container lifecycle fixture
pub mod fixture;

/// Handle to a started container
pub mod container;

/// Command execution inside containers
pub mod exec;

/// Line-prefixing output mirror
pub mod output;

/// Run-if predicates for skipping tests
pub mod condition;

/// Tracing setup for test suites
pub mod logging;

pub use condition::{should_run, Condition, DockerAvailable, EnvVar};
pub use config::FixtureConfig;
pub use container::RunningContainer;
pub use error::FixtureError;
pub use exec::ExecOutput;
pub use fixture::{ContainerFixture, FixtureState};
pub use output::PrefixedWriter;

/// Result type alias for fixture operations
pub type Result<T> = std::result::Result<T, FixtureError>;
