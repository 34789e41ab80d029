//! # Process Runner
//!
//! Runs external programs with piped output and a hard timeout.
//! The child is killed when the timeout elapses.

use crate::domain::error::CommandError;
use std::process::Stdio;
use std::time::Duration;

#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes `program` with `args`. A non-zero exit is an error carrying stderr.
pub async fn run(program: &str, args: &[String], timeout: Duration) -> Result<ProcessOutput, CommandError> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| CommandError::Upstream(format!("failed to spawn {program}: {e}")))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| CommandError::Timeout("exec"))??;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(CommandError::Upstream(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(ProcessOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_run_success() {
        let out = run("sh", &sh("echo hello; echo warn >&2"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "warn");
    }

    #[tokio::test]
    async fn test_run_failure_carries_stderr() {
        match run("sh", &sh("echo broken >&2; exit 3"), Duration::from_secs(5)).await {
            Err(CommandError::Upstream(msg)) => assert!(msg.contains("broken")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let result = run("sh", &sh("sleep 5"), Duration::from_millis(100)).await;
        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = run("definitely-not-a-real-binary-ash", &[], Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CommandError::Upstream(_))));
    }
}
