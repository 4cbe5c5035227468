//! Rules that judge the output of an arbitrary read-only command.

use async_trait::async_trait;
use secbench_core::command::command_line;
use secbench_core::{Capture, CommandOutput, Rule, RuleContext, RuleError};
use std::fmt;

/// What the command's result must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandExpectation {
    /// Stdout contains the text, ignoring ASCII case.
    StdoutContains(String),
    /// Stdout does not contain the text, ignoring ASCII case.
    StdoutLacks(String),
    /// The process exits with this code.
    ExitCode(i32),
}

impl CommandExpectation {
    fn is_met(&self, output: &CommandOutput) -> bool {
        match self {
            CommandExpectation::StdoutContains(needle) => contains_ignore_case(&output.stdout, needle),
            CommandExpectation::StdoutLacks(needle) => !contains_ignore_case(&output.stdout, needle),
            CommandExpectation::ExitCode(code) => output.exit_code == *code,
        }
    }

    /// Content checks only make sense on a successful run.
    fn needs_success(&self) -> bool {
        !matches!(self, CommandExpectation::ExitCode(_))
    }
}

impl fmt::Display for CommandExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandExpectation::StdoutContains(s) => write!(f, "output contains \"{s}\""),
            CommandExpectation::StdoutLacks(s) => write!(f, "output does not contain \"{s}\""),
            CommandExpectation::ExitCode(c) => write!(f, "exit code {c}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandRule {
    id: String,
    description: String,
    program: String,
    args: Vec<String>,
    expected: CommandExpectation,
}

impl CommandRule {
    pub fn new(
        id: &str,
        description: &str,
        program: &str,
        args: &[&str],
        expected: CommandExpectation,
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            expected,
        }
    }
}

#[async_trait]
impl Rule for CommandRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate(&self, ctx: &RuleContext, out: &mut Capture) -> Result<(), RuleError> {
        let output = ctx.commands().run(&self.program, &self.args).await?;
        let line = command_line(&self.program, &self.args);

        if self.expected.needs_success() && !output.success() {
            return Err(RuleError::Command {
                command: line,
                detail: format!("exit code {}: {}", output.exit_code, output.stderr.trim()),
            });
        }

        let verdict = format!("`{line}`: expected {}", self.expected);
        if self.expected.is_met(&output) {
            out.pass(verdict);
        } else {
            out.fail(verdict);
            out.raw(output.stdout.trim());
        }
        Ok(())
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
