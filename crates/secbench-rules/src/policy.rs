//! Security-policy rules, evaluated against the run's shared `secedit` export.

use crate::expect::NumericExpectation;
use async_trait::async_trait;
use secbench_core::{Capture, Rule, RuleContext, RuleError};
use std::fmt;

/// Expected value of a security-policy setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyExpectation {
    Number(NumericExpectation),
    /// Numeric and non-zero, within the bound (e.g. maximum password age).
    NonZero(NumericExpectation),
    /// Text that must differ from the given value, ignoring case and quotes
    /// (e.g. renamed built-in accounts).
    TextNot(String),
}

impl fmt::Display for PolicyExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyExpectation::Number(n) => write!(f, "{n}"),
            PolicyExpectation::NonZero(n) => write!(f, "{n}, not 0"),
            PolicyExpectation::TextNot(s) => write!(f, "not \"{s}\""),
        }
    }
}

/// Checks one `key = value` setting of the exported security policy.
///
/// All policy rules of a run read the same export; a failed export is an
/// evaluation error for every one of them.
#[derive(Debug, Clone)]
pub struct SecurityPolicyRule {
    id: String,
    description: String,
    key: String,
    expected: PolicyExpectation,
}

impl SecurityPolicyRule {
    pub fn new(id: &str, description: &str, key: &str, expected: PolicyExpectation) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            key: key.to_string(),
            expected,
        }
    }

    fn is_met(&self, value: &str) -> Result<bool, RuleError> {
        match &self.expected {
            PolicyExpectation::Number(n) => Ok(n.is_met(self.number(value)?)),
            PolicyExpectation::NonZero(n) => {
                let v = self.number(value)?;
                Ok(v != 0 && n.is_met(v))
            }
            PolicyExpectation::TextNot(s) => Ok(!unquote(value).eq_ignore_ascii_case(s)),
        }
    }

    fn number(&self, value: &str) -> Result<i64, RuleError> {
        unquote(value).parse::<i64>().map_err(|_| {
            RuleError::UnexpectedOutput(format!("{} is not numeric: {value}", self.key))
        })
    }
}

#[async_trait]
impl Rule for SecurityPolicyRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn evaluate(&self, ctx: &RuleContext, out: &mut Capture) -> Result<(), RuleError> {
        let value = ctx
            .policy()
            .setting(&self.key)
            .await?
            .ok_or_else(|| RuleError::PolicySettingMissing(self.key.clone()))?;

        let verdict = format!("{} = {value} (expected {})", self.key, self.expected);
        if self.is_met(&value)? {
            out.pass(verdict);
        } else {
            out.fail(verdict);
        }
        Ok(())
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use secbench_core::classify;
    use secbench_core::fakes::{fake_context, FakeCommandRunner};
    use secbench_core::Status;
    use std::sync::Arc;

    const EXPORT: &str = "[Unicode]\nUnicode=yes\n[System Access]\nMinimumPasswordAge = 1\nMaximumPasswordAge = 0\nMinimumPasswordLength = 8\nNewAdministratorName = \"Administrator\"\nNewGuestName = \"Visitor\"\n";

    async fn status_of(rule: SecurityPolicyRule) -> Result<Status, RuleError> {
        let ctx = fake_context(Arc::new(FakeCommandRunner::new()), EXPORT);
        let mut out = Capture::new();
        rule.evaluate(&ctx, &mut out).await?;
        Ok(classify(out.as_str()).status)
    }

    #[tokio::test]
    async fn test_numeric_bounds() {
        let ok = SecurityPolicyRule::new(
            "1.1.3",
            "Minimum password age",
            "MinimumPasswordAge",
            PolicyExpectation::Number(NumericExpectation::AtLeast(1)),
        );
        let short = SecurityPolicyRule::new(
            "1.1.4",
            "Minimum password length",
            "MinimumPasswordLength",
            PolicyExpectation::Number(NumericExpectation::AtLeast(14)),
        );

        assert_eq!(status_of(ok).await.expect("evaluates"), Status::Compliant);
        assert_eq!(status_of(short).await.expect("evaluates"), Status::NonCompliant);
    }

    #[tokio::test]
    async fn test_zero_fails_non_zero_expectation() {
        let rule = SecurityPolicyRule::new(
            "1.1.2",
            "Maximum password age",
            "MaximumPasswordAge",
            PolicyExpectation::NonZero(NumericExpectation::AtMost(365)),
        );
        assert_eq!(status_of(rule).await.expect("evaluates"), Status::NonCompliant);
    }

    #[tokio::test]
    async fn test_renamed_account() {
        let admin = SecurityPolicyRule::new(
            "2.3.1.5",
            "Rename administrator account",
            "NewAdministratorName",
            PolicyExpectation::TextNot("Administrator".to_string()),
        );
        let guest = SecurityPolicyRule::new(
            "2.3.1.6",
            "Rename guest account",
            "NewGuestName",
            PolicyExpectation::TextNot("Guest".to_string()),
        );

        assert_eq!(status_of(admin).await.expect("evaluates"), Status::NonCompliant);
        assert_eq!(status_of(guest).await.expect("evaluates"), Status::Compliant);
    }

    #[tokio::test]
    async fn test_missing_setting_is_error() {
        let rule = SecurityPolicyRule::new(
            "1.2.1",
            "Account lockout duration",
            "LockoutDuration",
            PolicyExpectation::Number(NumericExpectation::AtLeast(15)),
        );
        assert!(matches!(
            status_of(rule).await,
            Err(RuleError::PolicySettingMissing(key)) if key == "LockoutDuration"
        ));
    }

    #[tokio::test]
    async fn test_non_numeric_value_is_error() {
        let rule = SecurityPolicyRule::new(
            "x",
            "numeric on text",
            "NewGuestName",
            PolicyExpectation::Number(NumericExpectation::Equals(1)),
        );
        assert!(matches!(status_of(rule).await, Err(RuleError::UnexpectedOutput(_))));
    }
}
