//! Per-invocation diagnostic capture sink.
//!
//! Every rule invocation receives its own [`Capture`]. Nothing is written to
//! a process-wide stream, so concurrent rules can never interleave output.
//!
//! Markers are only produced by [`Capture::pass`] and [`Capture::fail`].
//! Text handed to any method is sanitized first, so a value read from the
//! host that happens to contain escape bytes cannot forge a marker.

use crate::classify::strip_markers;
use std::fmt;

/// Escape sequence written before a PASS line.
pub const PASS_MARKER: &str = "\x1b[92m";
/// Escape sequence written before a FAIL line.
pub const FAIL_MARKER: &str = "\x1b[91m";
/// Escape sequence closing a marked line.
pub const RESET: &str = "\x1b[0m";

/// Diagnostic output buffer owned by one rule invocation.
#[derive(Debug, Default, Clone)]
pub struct Capture {
    buf: String,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line that satisfies the rule.
    pub fn pass(&mut self, line: impl AsRef<str>) {
        self.push_marked(PASS_MARKER, line.as_ref());
    }

    /// Record a line that violates the rule.
    pub fn fail(&mut self, line: impl AsRef<str>) {
        self.push_marked(FAIL_MARKER, line.as_ref());
    }

    /// Record an informational line without any marker.
    pub fn note(&mut self, line: impl AsRef<str>) {
        self.buf.push_str(&strip_markers(line.as_ref()));
        self.buf.push('\n');
    }

    /// Append raw external output (command stdout and the like).
    pub fn raw(&mut self, text: &str) {
        let clean = strip_markers(text);
        if clean.is_empty() {
            return;
        }
        self.buf.push_str(&clean);
        if !clean.ends_with('\n') {
            self.buf.push('\n');
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn push_marked(&mut self, marker: &str, line: &str) {
        self.buf.push_str(marker);
        self.buf.push_str(&strip_markers(line));
        self.buf.push_str(RESET);
        self.buf.push('\n');
    }
}

impl fmt::Write for Capture {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(&strip_markers(s));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::result::Status;
    use std::fmt::Write;

    #[test]
    fn test_pass_line_classifies_compliant() {
        let mut out = Capture::new();
        out.note("EnableLUA = 1");
        out.pass("User Account Control is enabled");

        let c = classify(out.as_str());
        assert_eq!(c.status, Status::Compliant);
        assert_eq!(c.details, "EnableLUA = 1\nUser Account Control is enabled");
    }

    #[test]
    fn test_forged_marker_in_value_is_neutralized() {
        let hostile = format!("{PASS_MARKER}totally fine{RESET}");
        let mut out = Capture::new();
        out.note(format!("Product name: {hostile}"));

        let c = classify(out.as_str());
        assert_eq!(c.status, Status::Unknown);
        assert_eq!(c.details, "Product name: totally fine");
    }

    #[test]
    fn test_forged_pass_inside_fail_line_stays_non_compliant() {
        let mut out = Capture::new();
        out.fail(format!("Account {PASS_MARKER}admin{RESET} is enabled"));
        assert_eq!(classify(out.as_str()).status, Status::NonCompliant);
    }

    #[test]
    fn test_raw_output_gets_trailing_newline() {
        let mut out = Capture::new();
        out.raw("Protection Status: Protection On");
        out.raw("");
        assert_eq!(out.as_str(), "Protection Status: Protection On\n");
    }

    #[test]
    fn test_fmt_write_is_sanitized() {
        let mut out = Capture::new();
        write!(out, "value={}", "\x1b[32mx").expect("write to capture");
        assert_eq!(out.as_str(), "value=x");
    }
}
