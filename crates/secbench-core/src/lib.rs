//! secbench core library
//!
//! Generic engine for security benchmark compliance runs:
//! - [`Rule`] contract with a per-invocation [`Capture`] sink
//! - [`classify`] turning captured output into a [`Status`]
//! - [`Harness`] running rules in isolation with bounded concurrency and timeouts
//! - [`Aggregate`] scoring against a fixed catalog point count
//! - HTML and JSON report rendering

pub mod aggregate;
pub mod capture;
pub mod catalog;
pub mod classify;
pub mod command;
pub mod error;
pub mod fakes;
pub mod harness;
pub mod obs;
pub mod policy;
pub mod report;
pub mod result;
pub mod rule;
pub mod run;
pub mod telemetry;

pub use aggregate::{Aggregate, Aggregator};
pub use capture::Capture;
pub use catalog::Catalog;
pub use classify::{classify, strip_markers, Classification, Marker};
pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use error::{EngineError, Result, RuleError};
pub use harness::{Harness, HarnessConfig};
pub use policy::{PolicyExporter, SeceditExporter, SharedPolicy};
pub use report::{
    escape_html, load_json_report, write_html_report, write_json_report, ReportDocument,
    ReportRow, ReportSummary, RunMetadata, Treatment,
};
pub use result::{RuleResult, RuleState, Status};
pub use rule::{Rule, RuleContext};
pub use run::{host_identifier, ComplianceRun, RunOutcome};
pub use telemetry::init_tracing;

/// secbench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
