//! Error taxonomy for the compliance engine.
//!
//! Two families exist and they never mix:
//! - [`RuleError`] is raised by a single rule while it queries the host. The
//!   harness always recovers it locally into an `Error` result.
//! - [`EngineError`] is raised by the engine itself (catalog construction,
//!   report rendering) and is propagated to the caller.

use std::path::PathBuf;

/// Failure while evaluating a single rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("registry value not found: {0}")]
    RegistryValueMissing(String),

    #[error("security policy export failed: {0}")]
    PolicyExport(String),

    #[error("security policy setting not found: {0}")]
    PolicySettingMissing(String),

    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error("unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine-level errors. Render failures are fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("duplicate rule id in catalog: {0}")]
    DuplicateRule(String),

    #[error("failed to write report {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
