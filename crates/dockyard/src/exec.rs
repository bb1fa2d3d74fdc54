//! One-shot command execution inside a running container

use crate::output::PrefixedWriter;
use crate::{FixtureError, Result};
use dockyard_engine::{Engine, OutputChunk};
use futures::StreamExt;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between exec inspections while the command still reports running
pub const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Output of a finished exec session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exec session id
    pub exec_id: String,
    /// Exit code reported by the engine (-1 if none was reported)
    pub exit_code: i64,
    /// Combined stdout and stderr, in arrival order
    pub output: String,
}

impl ExecOutput {
    /// Check if the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into [`FixtureError::ExecutionFailure`]
    pub fn into_result(self, command: &[String]) -> Result<String> {
        if self.success() {
            return Ok(self.output);
        }

        Err(FixtureError::ExecutionFailure {
            command: command.join(" "),
            exit_code: self.exit_code,
            output: self.output.trim().to_string(),
        })
    }
}

/// Output mirror with separate line state per stream
struct Mirror<W: Write> {
    stdout: PrefixedWriter<W>,
    stderr: PrefixedWriter<W>,
}

impl Mirror<io::Stdout> {
    fn new() -> Self {
        Self::with_writers(io::stdout(), io::stdout())
    }
}

impl<W: Write> Mirror<W> {
    fn with_writers(stdout: W, stderr: W) -> Self {
        Self {
            stdout: PrefixedWriter::new(stdout),
            stderr: PrefixedWriter::new(stderr),
        }
    }

    fn write(&mut self, chunk: &OutputChunk) {
        let writer = match chunk {
            OutputChunk::StdOut(_) => &mut self.stdout,
            OutputChunk::StdErr(_) => &mut self.stderr,
        };

        if let Err(e) = writer.write_all(chunk.bytes()).and_then(|_| writer.flush()) {
            debug!("Failed to mirror exec output: {}", e);
        }
    }
}

/// Run `command` in the container and wait for it to finish.
///
/// The output stream is drained to completion with no deadline.
pub async fn run(
    engine: &dyn Engine,
    container_id: &str,
    command: &[String],
    mirror_output: bool,
) -> Result<ExecOutput> {
    info!("Executing in container: {}", command.join(" "));

    let exec_id = engine.create_exec(container_id, command).await?;
    let mut stream = engine.start_exec(&exec_id).await?;
    let mut mirror = mirror_output.then(Mirror::<io::Stdout>::new);
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(mirror) = mirror.as_mut() {
            mirror.write(&chunk);
        }
        buffer.extend_from_slice(chunk.bytes());
    }

    let mut status = engine.inspect_exec(&exec_id).await?;
    while status.running {
        tokio::time::sleep(EXEC_POLL_INTERVAL).await;
        status = engine.inspect_exec(&exec_id).await?;
    }

    debug!("Exec {} {}", exec_id, status);

    let exit_code = status.exit_code.unwrap_or_else(|| {
        warn!("Exec {} finished without an exit code", exec_id);
        -1
    });

    Ok(ExecOutput {
        exec_id,
        exit_code,
        output: String::from_utf8_lossy(&buffer).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn chunk_out(text: &'static str) -> OutputChunk {
        OutputChunk::StdOut(Bytes::from_static(text.as_bytes()))
    }

    fn chunk_err(text: &'static str) -> OutputChunk {
        OutputChunk::StdErr(Bytes::from_static(text.as_bytes()))
    }

    #[test]
    fn test_mirror_keeps_line_state_per_stream() {
        let mut mirror = Mirror::with_writers(Vec::new(), Vec::new());

        mirror.write(&chunk_out("building par"));
        mirror.write(&chunk_err("warning: slow\n"));
        mirror.write(&chunk_out("tial line\ndone\n"));
        mirror.write(&chunk_err("again"));

        let stdout = String::from_utf8(mirror.stdout.into_inner()).unwrap();
        let stderr = String::from_utf8(mirror.stderr.into_inner()).unwrap();
        assert_eq!(stdout, "DOCKER: building partial line\nDOCKER: done\n");
        assert_eq!(stderr, "DOCKER: warning: slow\nDOCKER: again");
    }

    #[test]
    fn test_into_result() {
        let command = vec!["sh".to_string(), "-c".to_string(), "exit 2".to_string()];
        let ok = ExecOutput {
            exec_id: "e1".to_string(),
            exit_code: 0,
            output: "fine\n".to_string(),
        };
        assert!(ok.success());
        assert_eq!(ok.into_result(&command).unwrap(), "fine\n");

        let failed = ExecOutput {
            exec_id: "e2".to_string(),
            exit_code: 2,
            output: "\n  nope  \n".to_string(),
        };
        match failed.into_result(&command) {
            Err(FixtureError::ExecutionFailure { command, exit_code, output }) => {
                assert_eq!(command, "sh -c exit 2");
                assert_eq!(exit_code, 2);
                assert_eq!(output, "nope");
            }
            other => panic!("Expected ExecutionFailure, got {:?}", other),
        }
    }
}
