//! One compliance run: catalog -> harness -> aggregate, plus run metadata.

use crate::aggregate::{Aggregate, Aggregator};
use crate::catalog::Catalog;
use crate::harness::Harness;
use crate::obs::{emit_run_finished, emit_run_started, run_span};
use crate::report::{ReportDocument, RunMetadata};
use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metadata: RunMetadata,
    pub aggregate: Aggregate,
}

impl RunOutcome {
    /// Report document for this run.
    pub fn document(&self) -> ReportDocument {
        ReportDocument::new(self.metadata.clone(), &self.aggregate)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.metadata.finished_at - self.metadata.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Compliance run orchestrator.
pub struct ComplianceRun;

impl ComplianceRun {
    /// Execute every rule in `catalog` and score the results.
    ///
    /// Per-rule failures never abort the run; they surface as `Error` results.
    pub async fn execute(catalog: &Catalog, harness: &Harness) -> RunOutcome {
        Self::execute_on_host(catalog, harness, host_identifier()).await
    }

    /// Same as [`ComplianceRun::execute`] with an explicit host identifier.
    pub async fn execute_on_host(catalog: &Catalog, harness: &Harness, host: String) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let run_id_str = run_id.to_string();

        async move {
            let started_at = Utc::now();
            emit_run_started(
                &run_id_str,
                catalog.name(),
                catalog.len(),
                harness.config().max_concurrent,
            );

            let mut aggregator = Aggregator::new(catalog.total_possible_points());
            aggregator.extend(harness.run_catalog(catalog).await);
            let aggregate = aggregator.finish();

            let metadata = RunMetadata {
                run_id,
                started_at,
                finished_at: Utc::now(),
                host,
                catalog_name: catalog.name().to_string(),
                catalog_version: catalog.version().to_string(),
                catalog_digest: catalog.digest(),
            };
            let outcome = RunOutcome {
                metadata,
                aggregate,
            };

            emit_run_finished(
                &run_id_str,
                outcome.aggregate.compliant_count(),
                outcome.aggregate.total_possible_points(),
                outcome.aggregate.percentage(),
                outcome.duration_ms(),
            );
            outcome
        }
        .instrument(run_span(&run_id.to_string()))
        .await
    }
}

/// Name of the local host, or `unknown-host` when it cannot be read.
pub fn host_identifier() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}
