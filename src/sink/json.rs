use std::io::Write;

use serde::Serialize;

use crate::core::AuditReport;
use crate::core::timestamp::format_rfc3339;
use crate::engine::SkipReason;
use crate::sink::{ReportMeta, ReportSink, SCHEMA_VERSION, SinkError};

#[derive(Debug, Serialize)]
struct Document<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    generated_at: String,
    region: &'a str,
    sheets: &'a AuditReport,
    failures: Vec<FailureEntry<'a>>,
    skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Serialize)]
struct FailureEntry<'a> {
    check: &'static str,
    label: &'static str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct SkippedEntry {
    check: &'static str,
    reason: SkipReason,
}

/// Pretty-printed JSON document, one object per sheet.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn write(&mut self, report: &AuditReport, meta: &ReportMeta<'_>) -> Result<(), SinkError> {
        let doc = Document {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION"),
            generated_at: format_rfc3339(meta.generated_at),
            region: meta.region,
            sheets: report,
            failures: meta
                .failures
                .iter()
                .map(|f| FailureEntry {
                    check: f.kind.key(),
                    label: f.kind.label(),
                    message: &f.message,
                })
                .collect(),
            skipped: meta
                .skipped
                .iter()
                .map(|(kind, reason)| SkippedEntry {
                    check: kind.key(),
                    reason: *reason,
                })
                .collect(),
        };
        serde_json::to_writer_pretty(&mut self.out, &doc)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
