//! Run-scoped cache of the local security policy export.
//!
//! Many rules read the same `secedit /export` blob. The export is performed
//! at most once per cache, on first use, and the outcome (text or failure) is
//! shared by every rule that asks for it. The harness builds a fresh cache
//! for each catalog run.

use crate::command::{command_line, CommandRunner};
use crate::error::RuleError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Produces the security policy export text.
#[async_trait]
pub trait PolicyExporter: Send + Sync {
    async fn export(&self) -> Result<String, RuleError>;
}

/// Exports the policy with `secedit /export /areas SECURITYPOLICY`.
pub struct SeceditExporter {
    runner: Arc<dyn CommandRunner>,
}

impl SeceditExporter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PolicyExporter for SeceditExporter {
    async fn export(&self) -> Result<String, RuleError> {
        let dir = tempfile::tempdir()?;
        let cfg = dir.path().join("secpol.cfg");
        let args = vec![
            "/export".to_string(),
            "/cfg".to_string(),
            cfg.display().to_string(),
            "/areas".to_string(),
            "SECURITYPOLICY".to_string(),
        ];

        let output = self.runner.run("secedit", &args).await?;
        if !output.success() {
            return Err(RuleError::PolicyExport(format!(
                "`{}` exited with code {}: {}",
                command_line("secedit", &args),
                output.exit_code,
                output.stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&cfg).await.map_err(|e| {
            RuleError::PolicyExport(format!("cannot read {}: {}", cfg.display(), e))
        })?;
        Ok(decode_export(&bytes))
    }
}

/// Decode an export file. `secedit` writes UTF-16LE with a BOM.
pub fn decode_export(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    let rest = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8_lossy(rest).to_string()
}

/// Look up `key = value` in an export blob. Keys match case-insensitively.
pub fn lookup_setting<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
    })
}

/// Cached outcome of the export: the text, or the failure message.
type ExportOutcome = Result<Arc<str>, String>;

/// Export shared across all rules of one run.
///
/// The export runs in its own task, so a rule that is cancelled while
/// waiting for it (for example on timeout) does not cancel the export.
/// Dropping the cache aborts an export that is still in flight.
pub struct SharedPolicy {
    exporter: Arc<dyn PolicyExporter>,
    export_timeout: Option<Duration>,
    inflight: Mutex<Option<InFlight>>,
}

struct InFlight {
    outcome: watch::Receiver<Option<ExportOutcome>>,
    task: AbortHandle,
}

impl SharedPolicy {
    pub fn new(exporter: Arc<dyn PolicyExporter>) -> Self {
        Self {
            exporter,
            export_timeout: None,
            inflight: Mutex::new(None),
        }
    }

    /// Give up on the export after `timeout`. The timeout is cached as a
    /// failure like any other. Zero disables it.
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Export text, running the exporter on first call only.
    ///
    /// Concurrent callers wait for the single in-flight export. A failed
    /// export is cached too and reported to every caller.
    pub async fn text(&self) -> Result<Arc<str>, RuleError> {
        let mut outcome = self.subscribe()?;
        let cached = match outcome.wait_for(Option::is_some).await {
            Ok(ready) => ready.clone(),
            Err(_) => None,
        };

        match cached {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(RuleError::PolicyExport(msg)),
            None => Err(RuleError::PolicyExport(
                "policy export ended without a result".to_string(),
            )),
        }
    }

    /// Value of one setting, or `None` when the export does not list it.
    pub async fn setting(&self, key: &str) -> Result<Option<String>, RuleError> {
        let text = self.text().await?;
        Ok(lookup_setting(&text, key).map(str::to_string))
    }

    /// Whether the export has finished (successfully or not).
    pub fn is_loaded(&self) -> bool {
        self.inflight
            .lock()
            .map(|slot| {
                slot.as_ref()
                    .is_some_and(|f| f.outcome.borrow().is_some())
            })
            .unwrap_or(false)
    }

    /// Receiver for the export outcome, starting the export on first use.
    fn subscribe(&self) -> Result<watch::Receiver<Option<ExportOutcome>>, RuleError> {
        let mut slot = self
            .inflight
            .lock()
            .map_err(|_| RuleError::PolicyExport("policy cache lock poisoned".to_string()))?;
        if let Some(inflight) = slot.as_ref() {
            return Ok(inflight.outcome.clone());
        }

        let (tx, rx) = watch::channel(None);
        let exporter = Arc::clone(&self.exporter);
        let export_timeout = self.export_timeout;
        let task = tokio::spawn(async move {
            let outcome = run_export(exporter.as_ref(), export_timeout).await;
            tx.send_replace(Some(outcome));
        });
        *slot = Some(InFlight {
            outcome: rx.clone(),
            task: task.abort_handle(),
        });
        Ok(rx)
    }
}

impl Drop for SharedPolicy {
    fn drop(&mut self) {
        if let Ok(slot) = self.inflight.get_mut() {
            if let Some(inflight) = slot.take() {
                inflight.task.abort();
            }
        }
    }
}

async fn run_export(exporter: &dyn PolicyExporter, export_timeout: Option<Duration>) -> ExportOutcome {
    info!(event = "policy.export_started");
    let exported = match export_timeout {
        Some(limit) => match tokio::time::timeout(limit, exporter.export()).await {
            Ok(exported) => exported,
            Err(_) => Err(RuleError::PolicyExport(format!(
                "policy export timed out after {} ms",
                limit.as_millis()
            ))),
        },
        None => exporter.export().await,
    };

    match exported {
        Ok(text) => {
            debug!(bytes = text.len(), "security policy exported");
            Ok(Arc::from(text))
        }
        Err(e) => {
            warn!(event = "policy.export_failed", error = %e);
            match e {
                RuleError::PolicyExport(msg) => Err(msg),
                other => Err(other.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCommandRunner, StaticPolicyExporter};

    const EXPORT: &str = "[Unicode]\nUnicode=yes\n[System Access]\nMinimumPasswordAge = 1\nMaximumPasswordAge = 42\nPasswordHistorySize = 24\n";

    #[test]
    fn test_decode_utf16_export() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "MinimumPasswordLength = 14".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_export(&bytes), "MinimumPasswordLength = 14");
    }

    #[test]
    fn test_decode_utf8_export_with_bom() {
        let bytes = b"\xEF\xBB\xBFLockoutBadCount = 5";
        assert_eq!(decode_export(bytes), "LockoutBadCount = 5");
    }

    #[test]
    fn test_lookup_setting() {
        assert_eq!(lookup_setting(EXPORT, "MaximumPasswordAge"), Some("42"));
        assert_eq!(lookup_setting(EXPORT, "passwordhistorysize"), Some("24"));
        assert_eq!(lookup_setting(EXPORT, "LockoutBadCount"), None);
    }

    #[tokio::test]
    async fn test_export_runs_once() {
        let exporter = Arc::new(StaticPolicyExporter::ok(EXPORT));
        let policy = SharedPolicy::new(exporter.clone());
        assert!(!policy.is_loaded());

        assert_eq!(
            policy.setting("MinimumPasswordAge").await.expect("setting"),
            Some("1".to_string())
        );
        assert_eq!(
            policy.setting("MaximumPasswordAge").await.expect("setting"),
            Some("42".to_string())
        );
        assert!(policy.is_loaded());
        assert_eq!(exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_export_is_cached() {
        let exporter = Arc::new(StaticPolicyExporter::failing("access denied"));
        let policy = SharedPolicy::new(exporter.clone());

        for _ in 0..3 {
            let err = policy.text().await.expect_err("export fails");
            assert!(matches!(err, RuleError::PolicyExport(ref m) if m.contains("access denied")));
        }
        assert_eq!(exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_cancel_export() {
        let exporter = Arc::new(StaticPolicyExporter::ok(EXPORT).with_delay(Duration::from_millis(60)));
        let policy = SharedPolicy::new(exporter.clone());

        let gave_up = tokio::time::timeout(Duration::from_millis(10), policy.text()).await;
        assert!(gave_up.is_err());

        let text = policy.text().await.expect("export completes");
        assert!(text.contains("PasswordHistorySize"));
        assert!(policy.is_loaded());
        assert_eq!(exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_export_timeout_is_cached_failure() {
        let exporter = Arc::new(StaticPolicyExporter::ok(EXPORT).with_delay(Duration::from_secs(30)));
        let policy = SharedPolicy::new(exporter.clone()).with_export_timeout(Duration::from_millis(20));

        for _ in 0..2 {
            let err = policy.text().await.expect_err("export times out");
            assert!(err.to_string().contains("timed out after 20 ms"));
        }
        assert_eq!(exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_secedit_failure_is_policy_export_error() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.respond_prefix(
            "secedit /export",
            crate::command::CommandOutput::failed(5, "Access is denied."),
        );

        let err = SeceditExporter::new(runner.clone())
            .export()
            .await
            .expect_err("secedit fails");
        let msg = err.to_string();
        assert!(msg.contains("exited with code 5"));
        assert!(msg.contains("Access is denied."));
        assert_eq!(runner.calls().len(), 1);
    }
}
