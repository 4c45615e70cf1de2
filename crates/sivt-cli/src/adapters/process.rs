//! Local process execution for the tanzu, kubectl, govc and tmc CLIs

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use sivt_common::{Error, Result};
use sivt_workflow::actuator::CommandRunner;

use crate::error::ActuationErrorExt;

/// Run `program` with `args` and return stdout. A non-zero exit is an
/// actuation error for `entity` carrying stderr.
pub async fn run(entity: &str, program: &str, args: &[&str]) -> Result<String> {
    run_with_env(entity, program, args, &[]).await
}

pub async fn run_with_env(
    entity: &str,
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<String> {
    debug!(entity, "Running {} {}", program, args.join(" "));
    let mut command = Command::new(program);
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().await.actuation_err(entity)?;

    if !output.status.success() {
        return Err(Error::actuation(
            entity,
            format!(
                "{} {} failed: {}",
                program,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run `program` feeding `input` on stdin
pub async fn run_with_stdin(
    entity: &str,
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
    input: &str,
) -> Result<String> {
    use tokio::io::AsyncWriteExt;

    debug!(entity, "Running {} {} with stdin", program, args.join(" "));
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in env {
        command.env(key, value);
    }
    let mut child = command.spawn().actuation_err(entity)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await.actuation_err(entity)?;
    }

    let output = child.wait_with_output().await.actuation_err(entity)?;
    if !output.status.success() {
        return Err(Error::actuation(
            entity,
            format!(
                "{} {} failed: {}",
                program,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// [`CommandRunner`] over local processes. Command lines are split on
/// whitespace; no shell is involved.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn output(&self, command_line: &str) -> Result<String> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::configuration("empty command line"))?;
        let args: Vec<&str> = parts.collect();
        run(program, program, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = ProcessRunner.output("echo jq-1.6").await.unwrap();
        assert_eq!(out.trim(), "jq-1.6");
    }

    #[tokio::test]
    async fn non_zero_exit_is_actuation_error() {
        let err = run("shared", "false", &[]).await.unwrap_err();
        assert_eq!(err.entity(), Some("shared"));
    }

    #[tokio::test]
    async fn missing_program_is_actuation_error() {
        let err = ProcessRunner
            .output("sivt-no-such-tool version")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn stdin_is_forwarded() {
        let out = run_with_stdin("shared", "cat", &[], &[], "kind: Secret\n").await.unwrap();
        assert_eq!(out, "kind: Secret\n");
    }

    #[tokio::test]
    async fn empty_line_is_rejected() {
        assert!(ProcessRunner.output("   ").await.is_err());
    }
}
