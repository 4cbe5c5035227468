//! Numeric comparisons shared by the registry and security-policy rule kinds.

use std::fmt;

/// Expected range for a numeric setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericExpectation {
    Equals(i64),
    AtLeast(i64),
    AtMost(i64),
    /// Inclusive on both ends.
    Between(i64, i64),
}

impl NumericExpectation {
    pub fn is_met(&self, actual: i64) -> bool {
        match *self {
            NumericExpectation::Equals(v) => actual == v,
            NumericExpectation::AtLeast(v) => actual >= v,
            NumericExpectation::AtMost(v) => actual <= v,
            NumericExpectation::Between(lo, hi) => (lo..=hi).contains(&actual),
        }
    }
}

impl fmt::Display for NumericExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericExpectation::Equals(v) => write!(f, "= {v}"),
            NumericExpectation::AtLeast(v) => write!(f, ">= {v}"),
            NumericExpectation::AtMost(v) => write!(f, "<= {v}"),
            NumericExpectation::Between(lo, hi) => write!(f, "between {lo} and {hi}"),
        }
    }
}
