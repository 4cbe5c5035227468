//! Execution harness: runs rules in isolation and always yields one result per rule.
//!
//! Each invocation gets its own [`Capture`] and runs in its own task, so a
//! rule that errors, panics or hangs only affects its own result:
//! - `Err` from `evaluate` becomes `Status::Error` with the error text;
//! - a panic becomes `Status::Error` with the panic message;
//! - exceeding the per-rule timeout becomes `Status::Error` and the task is aborted.
//!
//! Catalog runs are bounded by a semaphore and reassembled in catalog order.
//! Each catalog run gets its own policy cache, so nothing carries over from
//! one run to the next.

use crate::capture::Capture;
use crate::catalog::Catalog;
use crate::classify::classify;
use crate::obs::{emit_rule_error, emit_rule_finished, emit_rule_started};
use crate::result::{RuleResult, RuleState};
use crate::rule::{Rule, RuleContext};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Harness tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Maximum rules in flight. `1` runs the catalog sequentially.
    pub max_concurrent: usize,

    /// Per-rule timeout. Zero disables the timeout.
    pub rule_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            rule_timeout: Duration::from_secs(30),
        }
    }
}

impl HarnessConfig {
    /// One rule at a time, default timeout.
    pub fn sequential() -> Self {
        Self {
            max_concurrent: 1,
            ..Self::default()
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_rule_timeout(mut self, rule_timeout: Duration) -> Self {
        self.rule_timeout = rule_timeout;
        self
    }
}

/// Runs rules against a shared [`RuleContext`].
///
/// [`Harness::run_rule`] uses the harness context as is.
/// [`Harness::run_catalog`] derives a fresh run-scoped context on every call.
#[derive(Clone)]
pub struct Harness {
    ctx: RuleContext,
    config: HarnessConfig,
}

impl Harness {
    pub fn new(ctx: RuleContext, config: HarnessConfig) -> Self {
        Self { ctx, config }
    }

    pub fn context(&self) -> &RuleContext {
        &self.ctx
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Evaluate one rule exactly once. Never fails: every outcome is a result.
    pub async fn run_rule(&self, rule: Arc<dyn Rule>) -> RuleResult {
        let id = rule.id().to_string();
        let description = rule.description().to_string();

        let state = RuleState::Pending.start().unwrap_or(RuleState::Running);
        emit_rule_started(&id, state);
        let start = Instant::now();

        let ctx = self.ctx.clone();
        let task = tokio::spawn(async move {
            let mut capture = Capture::new();
            let outcome = rule.evaluate(&ctx, &mut capture).await;
            (outcome, capture)
        });
        let abort = task.abort_handle();

        let joined = if self.config.rule_timeout.is_zero() {
            Ok(task.await)
        } else {
            tokio::time::timeout(self.config.rule_timeout, task).await
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match joined {
            Ok(Ok((Ok(()), capture))) => {
                let classification = classify(capture.as_str());
                RuleResult::new(
                    id,
                    description,
                    classification.status,
                    classification.details,
                    duration_ms,
                )
            }
            Ok(Ok((Err(e), _))) => {
                emit_rule_error(&id, &e);
                RuleResult::error(id, description, e, duration_ms)
            }
            Ok(Err(join_err)) => {
                let detail = describe_join_error(join_err);
                emit_rule_error(&id, &detail);
                RuleResult::error(id, description, detail, duration_ms)
            }
            Err(_elapsed) => {
                abort.abort();
                let detail = format!(
                    "timed out after {} ms",
                    self.config.rule_timeout.as_millis()
                );
                emit_rule_error(&id, &detail);
                RuleResult::error(id, description, detail, duration_ms)
            }
        };

        let state = state.finish(result.status()).unwrap_or(state);
        emit_rule_finished(result.id(), state, result.duration_ms());
        result
    }

    /// Run every rule of `catalog` and return results in catalog order.
    ///
    /// At most `max_concurrent` rules are in flight; completion order does
    /// not affect the returned order.
    pub async fn run_catalog(&self, catalog: &Catalog) -> Vec<RuleResult> {
        let rules = catalog.rules();
        let run = Harness {
            ctx: self.ctx.for_run(self.config.rule_timeout),
            config: self.config.clone(),
        };
        let mut slots: Vec<Option<RuleResult>> = vec![None; rules.len()];

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        let mut index_of = HashMap::new();

        for (index, rule) in rules.iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let harness = run.clone();
            let rule = Arc::clone(rule);
            let handle = tasks.spawn(async move {
                let _permit = permit;
                (index, harness.run_rule(rule).await)
            });
            index_of.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    let Some(&index) = index_of.get(&e.id()) else {
                        continue;
                    };
                    let rule = &rules[index];
                    let detail = describe_join_error(e);
                    (index, RuleResult::error(rule.id(), rule.description(), detail, 0))
                }
            };
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .zip(rules)
            .map(|(slot, rule)| {
                slot.unwrap_or_else(|| {
                    RuleResult::error(rule.id(), rule.description(), "rule was not executed", 0)
                })
            })
            .collect()
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "rule task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("rule panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("rule panicked: {msg}")
    } else {
        "rule panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{fake_context, FakeCommandRunner, Script, ScriptedRule};
    use crate::result::Status;

    fn harness(config: HarnessConfig) -> Harness {
        Harness::new(fake_context(Arc::new(FakeCommandRunner::new()), ""), config)
    }

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.rule_timeout, Duration::from_secs(30));
        assert_eq!(HarnessConfig::sequential().max_concurrent, 1);
        assert_eq!(HarnessConfig::default().with_max_concurrent(0).max_concurrent, 1);
    }

    #[tokio::test]
    async fn test_pass_rule_is_compliant_and_evaluated_once() {
        let rule = ScriptedRule::arc("1.1.5", "Password complexity", Script::Pass("PasswordComplexity = 1".into()));
        let result = harness(HarnessConfig::sequential()).run_rule(rule.clone()).await;

        assert_eq!(result.status(), Status::Compliant);
        assert_eq!(result.details(), "PasswordComplexity = 1");
        assert_eq!(result.id(), "1.1.5");
        assert_eq!(result.description(), "Password complexity");
        assert_eq!(rule.evaluations(), 1);
    }

    #[tokio::test]
    async fn test_rule_error_becomes_error_status() {
        let rule = ScriptedRule::arc("18.1", "Registry rule", Script::Raise("value missing".into()));
        let result = harness(HarnessConfig::sequential()).run_rule(rule).await;

        assert_eq!(result.status(), Status::Error);
        assert!(result.details().contains("value missing"));
    }

    #[tokio::test]
    async fn test_panic_becomes_error_status() {
        let rule = ScriptedRule::arc("18.2", "Panicking rule", Script::Panic("index out of range".into()));
        let result = harness(HarnessConfig::sequential()).run_rule(rule).await;

        assert_eq!(result.status(), Status::Error);
        assert!(result.details().contains("rule panicked"));
        assert!(result.details().contains("index out of range"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_not_unknown() {
        let slow = ScriptedRule::arc(
            "9.1.1",
            "Slow rule",
            Script::Delay(Duration::from_secs(30), Box::new(Script::Pass("late".into()))),
        );
        let config = HarnessConfig::sequential().with_rule_timeout(Duration::from_millis(50));
        let result = harness(config).run_rule(slow).await;

        assert_eq!(result.status(), Status::Error);
        assert!(result.details().contains("timed out"));
    }

    #[tokio::test]
    async fn test_silent_rule_is_unknown() {
        let rule = ScriptedRule::arc("2.2.1", "No verdict", Script::Silent("nothing to say".into()));
        let result = harness(HarnessConfig::sequential()).run_rule(rule).await;

        assert_eq!(result.status(), Status::Unknown);
        assert_eq!(result.details(), "nothing to say");
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let catalog = Catalog::new("empty", "0", 0);
        let results = harness(HarnessConfig::default()).run_catalog(&catalog).await;
        assert!(results.is_empty());
    }
}
