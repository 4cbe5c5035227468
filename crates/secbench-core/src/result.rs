//! Rule outcomes: normalized status, per-rule lifecycle and the immutable result record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized outcome of one rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Evaluated and the host satisfies the rule.
    Compliant,

    /// Evaluated and the host does not satisfy the rule.
    NonCompliant,

    /// The rule could not be evaluated (query failure, panic, timeout).
    Error,

    /// The rule ran but emitted no recognizable pass/fail marker.
    Unknown,
}

impl Status {
    /// All statuses in report order.
    pub const ALL: [Status; 4] = [
        Status::Compliant,
        Status::NonCompliant,
        Status::Error,
        Status::Unknown,
    ];

    /// Stable label used in serialized reports.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Compliant => "compliant",
            Status::NonCompliant => "non_compliant",
            Status::Error => "error",
            Status::Unknown => "unknown",
        }
    }

    /// Parse a serialized label. Returns `None` for anything unrecognized.
    pub fn from_label(label: &str) -> Option<Status> {
        Status::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a rule within one run: `Pending -> Running -> Finished`.
///
/// Transitions only move forward. A finished rule cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Pending,
    Running,
    Finished(Status),
}

impl RuleState {
    /// `Pending -> Running`. Any other state is returned unchanged as `Err`.
    pub fn start(self) -> Result<RuleState, RuleState> {
        match self {
            RuleState::Pending => Ok(RuleState::Running),
            other => Err(other),
        }
    }

    /// `Running -> Finished(status)`. Any other state is returned unchanged as `Err`.
    pub fn finish(self, status: Status) -> Result<RuleState, RuleState> {
        match self {
            RuleState::Running => Ok(RuleState::Finished(status)),
            other => Err(other),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RuleState::Finished(_))
    }

    /// Final status, once finished.
    pub fn status(&self) -> Option<Status> {
        match self {
            RuleState::Finished(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleState::Pending => f.write_str("pending"),
            RuleState::Running => f.write_str("running"),
            RuleState::Finished(_) => f.write_str("finished"),
        }
    }
}

/// Result of one rule in one run.
///
/// Built exactly once by the harness and never mutated afterwards; fields are
/// exposed read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleResult {
    id: String,
    description: String,
    status: Status,
    details: String,
    duration_ms: u64,
}

impl RuleResult {
    /// Create a result. `details` must already be marker-free.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        status: Status,
        details: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status,
            details: details.into(),
            duration_ms,
        }
    }

    /// Error result carrying the failure text as details.
    pub fn error(
        id: impl Into<String>,
        description: impl Into<String>,
        error: impl fmt::Display,
        duration_ms: u64,
    ) -> Self {
        Self::new(id, description, Status::Error, error.to_string(), duration_ms)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_label(status.label()), Some(status));
        }
        assert_eq!(Status::from_label("warning"), None);
        assert_eq!(Status::from_label(""), None);
    }

    #[test]
    fn test_status_serde_uses_labels() {
        let json = serde_json::to_string(&Status::NonCompliant).expect("serialize");
        assert_eq!(json, "\"non_compliant\"");
    }

    #[test]
    fn test_rule_state_forward_only() {
        let running = RuleState::Pending.start().expect("pending starts");
        assert_eq!(running, RuleState::Running);

        let done = running.finish(Status::Compliant).expect("running finishes");
        assert!(done.is_terminal());

        // No re-entry once finished.
        assert_eq!(done.start(), Err(done));
        assert_eq!(done.finish(Status::Error), Err(done));
        assert_eq!(RuleState::Pending.finish(Status::Unknown), Err(RuleState::Pending));
        assert_eq!(done.status(), Some(Status::Compliant));
        assert_eq!(done.to_string(), "finished");
        assert_eq!(RuleState::Running.status(), None);
    }

    #[test]
    fn test_error_result_stringifies_failure() {
        let result = RuleResult::error("1.1.1", "Password history", "access denied", 12);
        assert_eq!(result.status(), Status::Error);
        assert_eq!(result.details(), "access denied");
        assert_eq!(result.duration_ms(), 12);
    }
}
