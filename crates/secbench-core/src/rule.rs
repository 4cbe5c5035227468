//! The rule contract and the run-scoped context handed to every rule.

use crate::capture::Capture;
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::error::RuleError;
use crate::policy::{PolicyExporter, SeceditExporter, SharedPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One compliance check.
///
/// `evaluate` performs a read-only query and reports through `out`: a
/// [`Capture::pass`] or [`Capture::fail`] line carries the verdict, plain
/// notes carry context. Returning `Err` marks the rule as not evaluable.
/// A rule that writes no marker is classified `Unknown`.
///
/// `evaluate` must not block the thread. The harness timeout only fires at
/// an await point, so synchronous work belongs in `spawn_blocking`.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Stable short code, unique within a catalog (e.g. `1.1.4`).
    fn id(&self) -> &str;

    /// Human label shown in reports.
    fn description(&self) -> &str;

    async fn evaluate(&self, ctx: &RuleContext, out: &mut Capture) -> Result<(), RuleError>;
}

/// Collaborators shared by all rules of a run.
#[derive(Clone)]
pub struct RuleContext {
    commands: Arc<dyn CommandRunner>,
    exporter: Arc<dyn PolicyExporter>,
    policy: Arc<SharedPolicy>,
}

impl RuleContext {
    pub fn new(commands: Arc<dyn CommandRunner>, exporter: Arc<dyn PolicyExporter>) -> Self {
        Self {
            commands,
            policy: Arc::new(SharedPolicy::new(Arc::clone(&exporter))),
            exporter,
        }
    }

    /// Same collaborators with an empty policy cache, for a new run.
    pub fn for_run(&self, export_timeout: Duration) -> Self {
        Self {
            commands: Arc::clone(&self.commands),
            exporter: Arc::clone(&self.exporter),
            policy: Arc::new(
                SharedPolicy::new(Arc::clone(&self.exporter)).with_export_timeout(export_timeout),
            ),
        }
    }

    /// Context backed by the local host: real processes and `secedit`.
    pub fn system() -> Self {
        let commands: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        let exporter = Arc::new(SeceditExporter::new(Arc::clone(&commands)));
        Self::new(commands, exporter)
    }

    pub fn commands(&self) -> &dyn CommandRunner {
        self.commands.as_ref()
    }

    pub fn policy(&self) -> &SharedPolicy {
        &self.policy
    }
}
