//! Report rendering: a self-contained HTML page and a JSON document.
//!
//! Rule-supplied text (ids, descriptions, details) comes from live host state
//! and is escaped before it is embedded. Writing a report first deletes any
//! artifact already at the path, then writes the new one in full.

use crate::aggregate::Aggregate;
use crate::error::{EngineError, Result};
use crate::obs::emit_report_written;
use crate::result::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

/// Current report document schema.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Facts about the run that produced a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub host: String,
    pub catalog_name: String,
    pub catalog_version: String,
    pub catalog_digest: String,
}

/// Score section of a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub compliant_count: u32,
    pub total_possible_points: u32,
    pub percentage: f64,
    pub rule_count: usize,
    pub non_compliant_count: usize,
    pub error_count: usize,
    pub unknown_count: usize,
}

/// One rendered rule row. `status` is a label, so documents written by other
/// versions still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRow {
    pub id: String,
    pub description: String,
    pub status: String,
    pub details: String,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Everything a report contains, independent of output format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDocument {
    pub schema_version: String,
    pub metadata: RunMetadata,
    pub summary: ReportSummary,
    pub rows: Vec<ReportRow>,
}

impl ReportDocument {
    pub fn new(metadata: RunMetadata, aggregate: &Aggregate) -> Self {
        let summary = ReportSummary {
            compliant_count: aggregate.compliant_count(),
            total_possible_points: aggregate.total_possible_points(),
            percentage: aggregate.percentage(),
            rule_count: aggregate.results().len(),
            non_compliant_count: aggregate.non_compliant_count(),
            error_count: aggregate.error_count(),
            unknown_count: aggregate.unknown_count(),
        };

        let rows = aggregate
            .results()
            .iter()
            .map(|r| ReportRow {
                id: r.id().to_string(),
                description: r.description().to_string(),
                status: r.status().label().to_string(),
                details: r.details().to_string(),
                duration_ms: r.duration_ms(),
            })
            .collect();

        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            metadata,
            summary,
            rows,
        }
    }

    /// Report title: host and run timestamp.
    pub fn title(&self) -> String {
        format!(
            "Security Benchmark Report: {} ({})",
            self.metadata.host,
            self.metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    /// One-line score summary.
    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} points compliant ({:.2}%)",
            self.summary.compliant_count, self.summary.total_possible_points, self.summary.percentage
        )
    }

    /// Render the self-contained HTML page.
    pub fn render_html(&self) -> String {
        let mut html = String::with_capacity(4096 + self.rows.len() * 256);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str(
            "<meta http-equiv=\"Content-Security-Policy\" content=\"default-src 'none'; style-src 'unsafe-inline'\">\n",
        );
        html.push_str(&format!("<title>{}</title>\n", escape_html(&self.title())));
        html.push_str("<style>\n");
        html.push_str(INLINE_CSS);
        html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");

        html.push_str(&format!("<h1>{}</h1>\n", escape_html(&self.title())));
        html.push_str(&format!(
            "<p class=\"meta\">Catalog {} {} &middot; run {} &middot; finished {}</p>\n",
            escape_html(&self.metadata.catalog_name),
            escape_html(&self.metadata.catalog_version),
            self.metadata.run_id,
            self.metadata.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ));

        html.push_str(&format!(
            "<div class=\"summary\">\n<span class=\"summary-score\">{}</span>\n",
            escape_html(&self.summary_line())
        ));
        html.push_str(&format!(
            "<span class=\"summary-detail\">{} rules &middot; {} non-compliant &middot; {} errors &middot; {} unknown</span>\n</div>\n",
            self.summary.rule_count,
            self.summary.non_compliant_count,
            self.summary.error_count,
            self.summary.unknown_count,
        ));

        html.push_str("<table class=\"results\">\n");
        html.push_str("<thead><tr><th>ID</th><th>Description</th><th>Status</th><th>Details</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for row in &self.rows {
            let treatment = Treatment::for_label(&row.status);
            html.push_str(&format!(
                "<tr class=\"{}\"><td class=\"id\">{}</td><td>{}</td><td class=\"status\">{} {}</td><td><pre>{}</pre></td></tr>\n",
                treatment.class,
                escape_html(&row.id),
                escape_html(&row.description),
                treatment.icon,
                treatment.label,
                escape_html(&row.details),
            ));
        }
        html.push_str("</tbody>\n</table>\n</div>\n</body>\n</html>\n");

        html
    }
}

/// Visual treatment of one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Treatment {
    pub class: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

impl Treatment {
    pub fn for_status(status: Status) -> Self {
        match status {
            Status::Compliant => Treatment {
                class: "status-compliant",
                label: "Compliant",
                icon: "&#x2713;",
            },
            Status::NonCompliant => Treatment {
                class: "status-non-compliant",
                label: "Non-compliant",
                icon: "&#x2717;",
            },
            Status::Error => Treatment {
                class: "status-error",
                label: "Error",
                icon: "&#x26A1;",
            },
            Status::Unknown => Treatment {
                class: "status-unknown",
                label: "Unknown",
                icon: "?",
            },
        }
    }

    /// Treatment for a serialized label. Unrecognized labels get the
    /// non-compliant treatment.
    pub fn for_label(label: &str) -> Self {
        Self::for_status(Status::from_label(label).unwrap_or(Status::NonCompliant))
    }
}

/// Escape text for embedding in HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Delete `path` if present. A missing file is not an error.
fn remove_existing(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(EngineError::Render {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn replace_artifact(path: &Path, content: &str) -> Result<()> {
    remove_existing(path)?;
    std::fs::write(path, content).map_err(|source| EngineError::Render {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the HTML report, replacing any previous artifact at `path`.
pub fn write_html_report(path: &Path, document: &ReportDocument) -> Result<()> {
    replace_artifact(path, &document.render_html())?;
    emit_report_written(path, "html");
    Ok(())
}

/// Write the JSON report, replacing any previous artifact at `path`.
pub fn write_json_report(path: &Path, document: &ReportDocument) -> Result<()> {
    let content = serde_json::to_string_pretty(document)?;
    replace_artifact(path, &content)?;
    emit_report_written(path, "json");
    Ok(())
}

/// Load a JSON report written by [`write_json_report`].
pub fn load_json_report(path: &Path) -> Result<ReportDocument> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

const INLINE_CSS: &str = r#"body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f5f6f8; color: #1f2328; }
.container { max-width: 1200px; margin: 0 auto; padding: 24px; }
h1 { font-size: 1.5em; margin-bottom: 4px; }
.meta { color: #57606a; margin-top: 0; }
.summary { background: #fff; border: 1px solid #d0d7de; border-radius: 6px; padding: 12px 16px; margin: 16px 0; }
.summary-score { font-size: 1.3em; font-weight: 600; margin-right: 16px; }
.summary-detail { color: #57606a; }
table.results { width: 100%; border-collapse: collapse; background: #fff; }
table.results th, table.results td { border: 1px solid #d0d7de; padding: 6px 10px; text-align: left; vertical-align: top; }
table.results th { background: #eaeef2; }
td.id { white-space: nowrap; font-family: monospace; }
td.status { white-space: nowrap; font-weight: 600; }
pre { margin: 0; white-space: pre-wrap; word-break: break-word; font-size: 0.9em; }
tr.status-compliant td.status { color: #1a7f37; }
tr.status-non-compliant { background: #fff5f5; }
tr.status-non-compliant td.status { color: #cf222e; }
tr.status-error { background: #fff8e1; }
tr.status-error td.status { color: #9a6700; border-left: 4px solid #bf8700; }
tr.status-unknown td.status { color: #57606a; font-style: italic; }
"#;
