//! Registry value rules, evaluated through `reg query`.

use crate::expect::NumericExpectation;
use async_trait::async_trait;
use secbench_core::command::command_line;
use secbench_core::{Capture, Rule, RuleContext, RuleError};
use std::fmt;
use tracing::debug;

/// Value parsed from `reg query` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    Dword(u32),
    Qword(u64),
    String(String),
    MultiString(Vec<String>),
}

impl fmt::Display for RegValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegValue::Dword(v) => write!(f, "0x{v:08x} ({v})"),
            RegValue::Qword(v) => write!(f, "0x{v:016x} ({v})"),
            RegValue::String(s) => write!(f, "\"{s}\""),
            RegValue::MultiString(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Expected registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryExpectation {
    Number(NumericExpectation),
    /// Case-insensitive string comparison.
    Text(String),
}

impl fmt::Display for RegistryExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryExpectation::Number(n) => write!(f, "{n}"),
            RegistryExpectation::Text(s) => write!(f, "= \"{s}\""),
        }
    }
}

/// Checks one value under one key.
///
/// A value that does not exist is an evaluation error unless the rule was
/// built with [`RegistryValueRule::absent_is_compliant`], for settings whose
/// Windows default already satisfies the benchmark.
#[derive(Debug, Clone)]
pub struct RegistryValueRule {
    id: String,
    description: String,
    key: String,
    value_name: String,
    expected: RegistryExpectation,
    absent_is_compliant: bool,
}

impl RegistryValueRule {
    pub fn new(
        id: &str,
        description: &str,
        key: &str,
        value_name: &str,
        expected: RegistryExpectation,
    ) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            key: key.to_string(),
            value_name: value_name.to_string(),
            expected,
            absent_is_compliant: false,
        }
    }

    pub fn absent_is_compliant(mut self) -> Self {
        self.absent_is_compliant = true;
        self
    }

    fn location(&self) -> String {
        format!("{}\\{}", self.key, self.value_name)
    }

    fn query_args(&self) -> Vec<String> {
        vec![
            "query".to_string(),
            self.key.clone(),
            "/v".to_string(),
            self.value_name.clone(),
        ]
    }
}

#[async_trait]
impl Rule for RegistryValueRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate(&self, ctx: &RuleContext, out: &mut Capture) -> Result<(), RuleError> {
        let args = self.query_args();
        let output = ctx.commands().run("reg", &args).await?;

        if !output.success() {
            if is_not_found(&output.stdout) || is_not_found(&output.stderr) {
                debug!(rule = %self.id, location = %self.location(), "registry value absent");
                if self.absent_is_compliant {
                    out.pass(format!("{} is not set; the default is compliant", self.location()));
                    return Ok(());
                }
                return Err(RuleError::RegistryValueMissing(self.location()));
            }
            return Err(RuleError::Command {
                command: command_line("reg", &args),
                detail: format!("exit code {}: {}", output.exit_code, output.stderr.trim()),
            });
        }

        let actual = parse_reg_query_output(&output.stdout, &self.value_name).ok_or_else(|| {
            RuleError::UnexpectedOutput(format!("no parsable value for {}", self.location()))
        })?;

        let verdict = format!("{} = {actual} (expected {})", self.location(), self.expected);
        match compare(&actual, &self.expected) {
            Some(true) => out.pass(verdict),
            Some(false) => out.fail(verdict),
            None => out.fail(format!("{verdict}: registry value type mismatch")),
        }
        Ok(())
    }
}

/// `None` when the value's type cannot be compared with the expectation.
fn compare(actual: &RegValue, expected: &RegistryExpectation) -> Option<bool> {
    match (actual, expected) {
        (RegValue::Dword(v), RegistryExpectation::Number(n)) => Some(n.is_met(i64::from(*v))),
        (RegValue::Qword(v), RegistryExpectation::Number(n)) => {
            i64::try_from(*v).ok().map(|v| n.is_met(v))
        }
        (RegValue::String(s), RegistryExpectation::Text(t)) => Some(s.eq_ignore_ascii_case(t)),
        (RegValue::String(s), RegistryExpectation::Number(n)) => {
            s.trim().parse::<i64>().ok().map(|v| n.is_met(v))
        }
        _ => None,
    }
}

fn is_not_found(text: &str) -> bool {
    text.to_ascii_lowercase().contains("unable to find")
}

/// Parse the line for `value_name` out of `reg query` output.
///
/// Lines look like `    NoDriveTypeAutoRun    REG_DWORD    0xff`.
pub fn parse_reg_query_output(output: &str, value_name: &str) -> Option<RegValue> {
    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(type_pos) = parts.iter().position(|p| p.starts_with("REG_")) else {
            continue;
        };
        if !parts[..type_pos].join(" ").eq_ignore_ascii_case(value_name) {
            continue;
        }
        let value = parts[type_pos + 1..].join(" ");

        return match parts[type_pos] {
            "REG_DWORD" => parse_hex(&value).and_then(|v| u32::try_from(v).ok()).map(RegValue::Dword),
            "REG_QWORD" => parse_hex(&value).map(RegValue::Qword),
            "REG_SZ" | "REG_EXPAND_SZ" => Some(RegValue::String(value)),
            "REG_MULTI_SZ" => Some(RegValue::MultiString(
                value
                    .split("\\0")
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            _ => None,
        };
    }
    None
}

fn parse_hex(value: &str) -> Option<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).ok()
}
