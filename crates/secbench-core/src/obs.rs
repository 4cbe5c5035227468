//! Structured lifecycle events for compliance runs.
//!
//! Every event carries an `event = "..."` field so JSON log consumers can
//! filter on it.

use crate::result::{RuleState, Status};
use std::path::Path;
use tracing::{debug, info};

/// Run-scoped span. Attach it to the run future with `Instrument::instrument`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("secbench.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, catalog: &str, rules: usize, max_concurrent: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        catalog = %catalog,
        rules = rules,
        max_concurrent = max_concurrent,
    );
}

pub fn emit_rule_started(rule_id: &str, state: RuleState) {
    debug!(event = "rule.started", rule_id = %rule_id, state = %state);
}

/// Emit event: a rule reached its terminal state.
pub fn emit_rule_finished(rule_id: &str, state: RuleState, duration_ms: u64) {
    let status = state.status().map(|s| s.label()).unwrap_or("none");
    debug!(
        event = "rule.finished",
        rule_id = %rule_id,
        state = %state,
        status = %status,
        duration_ms = duration_ms,
    );
}

/// Emit event: a rule could not be evaluated.
pub fn emit_rule_error(rule_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "rule.error", rule_id = %rule_id, error = %error);
}

pub fn emit_run_finished(run_id: &str, compliant: u32, total_points: u32, percentage: f64, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        compliant = compliant,
        total_points = total_points,
        percentage = percentage,
        duration_ms = duration_ms,
    );
}

pub fn emit_report_written(path: &Path, format: &str) {
    info!(event = "report.written", path = %path.display(), format = %format);
}
