//! Result aggregation and scoring.

use crate::result::{RuleResult, Status};
use serde::Serialize;

/// Collects results in catalog order and produces the run [`Aggregate`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    total_possible_points: u32,
    results: Vec<RuleResult>,
}

impl Aggregator {
    pub fn new(total_possible_points: u32) -> Self {
        Self {
            total_possible_points,
            results: Vec::new(),
        }
    }

    /// Append one finalized result. Call in catalog order.
    pub fn push(&mut self, result: RuleResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = RuleResult>) {
        self.results.extend(results);
    }

    pub fn finish(self) -> Aggregate {
        Aggregate::new(self.results, self.total_possible_points)
    }
}

/// Run-wide rollup of all results into a score.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Aggregate {
    results: Vec<RuleResult>,
    compliant_count: u32,
    total_possible_points: u32,
    percentage: f64,
}

impl Aggregate {
    /// Score `results` against the catalog's fixed point count.
    ///
    /// # Panics
    ///
    /// When more rules are compliant than the catalog has points. That means
    /// the catalog's point constant is wrong for its rule set.
    pub fn new(results: Vec<RuleResult>, total_possible_points: u32) -> Self {
        let compliant_count = results
            .iter()
            .filter(|r| r.status() == Status::Compliant)
            .count() as u32;

        assert!(
            compliant_count <= total_possible_points,
            "compliant_count ({compliant_count}) exceeds total_possible_points ({total_possible_points})"
        );

        let percentage = if total_possible_points == 0 {
            0.0
        } else {
            f64::from(compliant_count) / f64::from(total_possible_points) * 100.0
        };

        Self {
            results,
            compliant_count,
            total_possible_points,
            percentage,
        }
    }

    /// Results in catalog order.
    pub fn results(&self) -> &[RuleResult] {
        &self.results
    }

    pub fn compliant_count(&self) -> u32 {
        self.compliant_count
    }

    pub fn total_possible_points(&self) -> u32 {
        self.total_possible_points
    }

    /// `compliant_count / total_possible_points * 100`.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Number of results with `status`.
    pub fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    pub fn non_compliant_count(&self) -> usize {
        self.count(Status::NonCompliant)
    }

    pub fn error_count(&self) -> usize {
        self.count(Status::Error)
    }

    pub fn unknown_count(&self) -> usize {
        self.count(Status::Unknown)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}
