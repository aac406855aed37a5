// Executes the external telemetry command under a hard timeout.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::retry::RetryableError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout_ms} ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("unusable output: {0}")]
    Parse(String),
}

impl RetryableError for QueryError {
    fn is_retryable(&self) -> bool {
        match self {
            QueryError::Timeout { .. } | QueryError::Exit { .. } => true,
            QueryError::Spawn { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            QueryError::Parse(_) => false,
        }
    }
}

/// Seam between the query client and the process that answers it.
pub trait QueryRunner: Send + Sync {
    /// Runs one query and returns its stdout. Must give up after `timeout`.
    fn run(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<String, QueryError>> + Send;
}

/// Spawns the configured program. The child is killed when the timeout drops its future.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl QueryRunner for CommandRunner {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<String, QueryError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(QueryError::Spawn {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(QueryError::Timeout {
                    program: self.program.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        if !output.status.success() {
            return Err(QueryError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
