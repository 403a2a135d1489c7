use std::fmt::Write as _;
use std::io::Write;

use unicode_width::UnicodeWidthStr;

use crate::core::timestamp::format_rfc3339;
use crate::core::{AuditReport, FindingSet};
use crate::sink::{ReportMeta, ReportSink, SinkError, is_highlighted};

/// Markdown document with one padded table per sheet. Negative values in
/// highlight columns are rendered bold.
pub struct MarkdownSink<W: Write> {
    out: W,
}

impl<W: Write> MarkdownSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for MarkdownSink<W> {
    fn write(&mut self, report: &AuditReport, meta: &ReportMeta<'_>) -> Result<(), SinkError> {
        let doc = format_markdown(report, meta);
        self.out.write_all(doc.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn format_markdown(report: &AuditReport, meta: &ReportMeta<'_>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Cloud audit report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Tool version: {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "- Generated at: {}", format_rfc3339(meta.generated_at));
    let _ = writeln!(out, "- Region: {}", meta.region);
    let _ = writeln!(out, "- Findings: {}", report.total_findings());

    if report.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "_No findings._");
    }

    for sheet in report.sheets() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## {} ({})", sheet.label, sheet.findings.len());
        let _ = writeln!(out);
        write_table(&mut out, &sheet.findings);
    }

    if !meta.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Failed checks");
        let _ = writeln!(out);
        for f in meta.failures {
            let _ = writeln!(out, "- {}: {}", f.kind.label(), f.message);
        }
    }

    let cancelled: Vec<_> = meta
        .skipped
        .iter()
        .filter(|(_, reason)| *reason == crate::engine::SkipReason::Cancelled)
        .collect();
    if !cancelled.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Not run (timeout)");
        let _ = writeln!(out);
        for (kind, _) in cancelled {
            let _ = writeln!(out, "- {}", kind.label());
        }
    }

    out
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn write_table(out: &mut String, set: &FindingSet) {
    let columns = set.schema();
    let rows: Vec<Vec<String>> = set
        .iter()
        .map(|finding| {
            columns
                .iter()
                .map(|col| {
                    let value = finding.get(col);
                    let cell = escape_cell(&value.to_string());
                    if is_highlighted(col, value) {
                        format!("**{cell}**")
                    } else {
                        cell
                    }
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            rows.iter()
                .map(|r| r[i].width())
                .max()
                .unwrap_or(0)
                .max(col.width())
                .max(3)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| pad_end(&escape_cell(col), *w))
        .collect();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "| {} |", rule.join(" | "));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad_end(cell, *w))
            .collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
}

fn pad_end(s: &str, width: usize) -> String {
    let w = s.width();
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}
