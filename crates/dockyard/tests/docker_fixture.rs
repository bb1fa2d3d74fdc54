//! Integration tests against a real docker engine
//!
//! Skipped unless DOCKER_HOST (or DOCKYARD_DOCKER_HOST) is set.

use anyhow::{Context, Result};
use dockyard::engine::{DockerEngine, Engine, EngineConfig};
use dockyard::logging::init_test_tracing;
use dockyard::{skip_unless, ContainerFixture, DockerAvailable, FixtureConfig, FixtureError, FixtureState};
use std::time::Duration;

const IMAGE: &str = "alpine:3.19";

/// Long-lived alpine container; the image's default shell exits at once
fn alpine() -> FixtureConfig {
    FixtureConfig::new(IMAGE)
        .with_pull_image(true)
        .with_command(["sleep", "3600"])
}

#[tokio::test]
async fn test_execute_echo() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    let mut fixture = ContainerFixture::from_env(alpine())?;
    fixture.start().await?;

    let output = fixture.execute(&["echo", "hello from dockyard"]).await;
    fixture.teardown().await?;

    assert_eq!(output?.trim(), "hello from dockyard");
    Ok(())
}

#[tokio::test]
async fn test_execute_failure_captures_stderr() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    ContainerFixture::from_env(alpine())?
        .run(|container| async move {
            let err = container
                .execute(&["sh", "-c", "echo broken >&2; exit 3"])
                .await
                .expect_err("command should fail");

            match err {
                FixtureError::ExecutionFailure { exit_code, output, .. } => {
                    assert_eq!(exit_code, 3);
                    assert_eq!(output, "broken");
                }
                other => panic!("Expected ExecutionFailure, got {:?}", other),
            }
            Ok(())
        })
        .await
}

#[tokio::test]
async fn test_target_matches_engine_binding() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    let config = alpine().with_exposed_port("8080/tcp");
    let mut fixture = ContainerFixture::from_env(config)?;
    let id = fixture.start().await?.id().to_string();

    let target = fixture.target("8080/tcp")?;

    let engine = DockerEngine::connect(&EngineConfig::from_env()?)?;
    let snapshot = engine.inspect_container(&id).await?;
    let binding = snapshot
        .host_binding("8080/tcp")
        .context("engine reports no binding for 8080/tcp")?;

    assert_eq!(target.port(), binding.host_port);
    assert_ne!(target.port(), 0);
    assert!(matches!(fixture.target("9999/tcp"), Err(FixtureError::PortNotExposed(_))));

    fixture.teardown().await?;
    Ok(())
}

#[tokio::test]
async fn test_bind_mount_and_env() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("greeting.txt"), "mounted content\n")?;

    let config = alpine()
        .with_bind(format!("{}:/data:ro", dir.path().display()))
        .with_env("GREETING", "hi there")
        .with_mirror_output(false);

    ContainerFixture::from_env(config)?
        .run(|container| async move {
            let file = container.execute(&["cat", "/data/greeting.txt"]).await?;
            assert_eq!(file, "mounted content\n");

            let env = container.execute(&["sh", "-c", "echo $GREETING"]).await?;
            assert_eq!(env.trim(), "hi there");
            Ok::<_, anyhow::Error>(())
        })
        .await
}

#[tokio::test]
async fn test_sequential_executions_are_independent() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    ContainerFixture::from_env(alpine())?
        .run(|container| async move {
            let first = container.execute(&["echo", "first"]).await?;
            let second = container.execute(&["echo", "second"]).await?;

            assert_eq!(first, "first\n");
            assert_eq!(second, "second\n");
            Ok::<_, anyhow::Error>(())
        })
        .await
}

#[tokio::test]
async fn test_execute_with_timeout_on_hung_command() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    ContainerFixture::from_env(alpine())?
        .run(|container| async move {
            let result = container
                .execute_with_timeout(&["sleep", "30"], Duration::from_secs(1))
                .await;

            assert!(matches!(result, Err(FixtureError::ExecTimeout { .. })));
            Ok(())
        })
        .await
}

#[tokio::test]
async fn test_teardown_of_exited_container() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    let config = FixtureConfig::new(IMAGE)
        .with_pull_image(true)
        .with_command(["sh", "-c", "sleep 2"]);
    let mut fixture = ContainerFixture::from_env(config)?;
    let id = fixture.start().await?.id().to_string();

    tokio::time::sleep(Duration::from_secs(3)).await;
    fixture.teardown().await?;

    let engine = DockerEngine::connect(&EngineConfig::from_env()?)?;
    assert!(!engine.list_containers().await?.contains(&id));
    Ok(())
}

#[tokio::test]
async fn test_teardown_removes_container() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    let mut fixture = ContainerFixture::from_env(alpine())?;
    let id = fixture.start().await?.id().to_string();

    let engine = DockerEngine::connect(&EngineConfig::from_env()?)?;
    assert!(engine.list_containers().await?.contains(&id));

    fixture.teardown().await?;

    assert_eq!(fixture.state(), &FixtureState::Stopped);
    assert!(fixture.container_id().is_none());
    assert!(!engine.list_containers().await?.contains(&id));
    Ok(())
}

#[tokio::test]
async fn test_start_with_unknown_image_fails() -> Result<()> {
    skip_unless!(DockerAvailable, Ok(()));
    init_test_tracing();

    let config = FixtureConfig::new("dockyard.invalid/no-such-image:latest");
    let mut fixture = ContainerFixture::from_env(config)?;

    assert!(fixture.start().await.is_err());
    assert!(matches!(fixture.state(), FixtureState::Failed(_)));
    assert!(fixture.container_id().is_none());
    Ok(())
}
