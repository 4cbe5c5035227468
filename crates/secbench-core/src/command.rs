//! External command seam used by rules that shell out (`reg`, `secedit`, ...).

use crate::error::RuleError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured output of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external programs on behalf of rules.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, RuleError>;
}

/// Join a program and its arguments for display and lookups.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Runs commands on the local host via `tokio::process`.
///
/// Children are killed when the invoking future is dropped, so a rule that
/// times out does not leave its process behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, RuleError> {
        debug!(command = %command_line(program, args), "spawning command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuleError::Command {
                command: command_line(program, args),
                detail: e.to_string(),
            })?;

        let output = child.wait_with_output().await?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_join() {
        let args = vec!["query".to_string(), "HKLM\\SOFTWARE".to_string()];
        assert_eq!(command_line("reg", &args), "reg query HKLM\\SOFTWARE");
        assert_eq!(command_line("whoami", &[]), "whoami");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_simple_command() {
        let output = SystemCommandRunner
            .run("echo", &["hello".to_string()])
            .await
            .expect("echo runs");
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failing_command() {
        let output = SystemCommandRunner.run("false", &[]).await.expect("false runs");
        assert!(!output.success());
        assert_ne!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_rule_error() {
        let err = SystemCommandRunner
            .run("secbench-definitely-not-a-program", &[])
            .await
            .expect_err("spawn must fail");
        assert!(matches!(err, RuleError::Command { .. }));
    }
}
