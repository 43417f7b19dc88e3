//! # Command Runner
//!
//! The seam between the agent and the external programs it observes
//! (`ceph`, `lshw`). Any failure, including a non-zero exit status, means
//! "no output this cycle".

use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use topograph_core::TopologyError;

/// Runs an external program and returns its standard output.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<Vec<u8>, TopologyError>> + Send;
}

/// Runs programs on this machine with a time budget.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<Vec<u8>, TopologyError>> + Send {
        let label = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        let timeout = self.timeout;

        async move {
            tracing::debug!("Running {}", label);
            let output = tokio::time::timeout(timeout, command.output())
                .await
                .map_err(|_| {
                    TopologyError::Collection(format!(
                        "{}: timed out after {}s",
                        label,
                        timeout.as_secs()
                    ))
                })?
                .map_err(|e| TopologyError::Collection(format!("{}: {}", label, e)))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(TopologyError::Collection(format!(
                    "{}: {}: {}",
                    label,
                    output.status,
                    stderr.trim()
                )));
            }
            Ok(output.stdout)
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_a_collection_error() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let result = runner.run("topograph-no-such-program", &["-s"]).await;
        assert!(matches!(result, Err(TopologyError::Collection(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_rejects_failure() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let stdout = runner.run("echo", &["hello"]).await.expect("echo");
        assert_eq!(stdout, b"hello\n");

        assert!(runner.run("false", &[]).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let runner = SystemRunner::new(Duration::from_millis(50));
        let result = runner.run("sleep", &["5"]).await;
        match result {
            Err(TopologyError::Collection(message)) => assert!(message.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other.map(|o| o.len())),
        }
    }
}
