//! Outcome classification of captured diagnostic text.
//!
//! Markers are ANSI SGR colour sequences: green (`32`/`92`) means PASS and red
//! (`31`/`91`) means FAIL. Precedence is fail-closed:
//!
//! | markers present | status         |
//! |-----------------|----------------|
//! | FAIL (any PASS) | `NonCompliant` |
//! | PASS only       | `Compliant`    |
//! | none            | `Unknown`      |
//!
//! Every escape sequence is stripped from the stored details.

use crate::result::Status;
use regex::Regex;
use std::sync::OnceLock;

/// Pass/fail signal embedded in diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Pass,
    Fail,
}

/// Status derived from captured output plus the marker-free details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub details: String,
}

fn escape_sequence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // CSI sequences plus lone two-byte escapes.
    RE.get_or_init(|| {
        Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|[@-Z\x5C-_])").expect("escape sequence pattern")
    })
}

/// Interpret one escape sequence as a marker, if it is one.
pub fn marker_of(sequence: &str) -> Option<Marker> {
    let params = sequence.strip_prefix("\x1b[")?.strip_suffix('m')?;

    let mut found = None;
    let mut parts = params.split(';');
    while let Some(part) = parts.next() {
        match part {
            // Extended colour selectors carry their own arguments.
            "38" | "48" => {
                match parts.next() {
                    Some("5") => {
                        parts.next();
                    }
                    Some("2") => {
                        parts.nth(2);
                    }
                    _ => {}
                }
            }
            "31" | "91" => return Some(Marker::Fail),
            "32" | "92" => found = Some(Marker::Pass),
            _ => {}
        }
    }
    found
}

/// Remove every escape sequence and stray control character, keeping newlines and tabs.
pub fn strip_markers(text: &str) -> String {
    escape_sequence()
        .replace_all(text, "")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Classify captured diagnostic output.
pub fn classify(output: &str) -> Classification {
    let mut saw_pass = false;
    let mut saw_fail = false;

    for m in escape_sequence().find_iter(output) {
        match marker_of(m.as_str()) {
            Some(Marker::Pass) => saw_pass = true,
            Some(Marker::Fail) => saw_fail = true,
            None => {}
        }
    }

    let status = if saw_fail {
        Status::NonCompliant
    } else if saw_pass {
        Status::Compliant
    } else {
        Status::Unknown
    };

    Classification {
        status,
        details: strip_markers(output).trim().to_string(),
    }
}
