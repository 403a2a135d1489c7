//! Report sinks. A sink owns presentation; the core hands it a flattened
//! [`AuditReport`] whose labels already fit the sink's advertised limit.

use thiserror::Error;
use time::OffsetDateTime;

use crate::checks::CheckKind;
use crate::core::{AuditReport, DEFAULT_MAX_LABEL_LEN, FieldValue};
use crate::engine::{AuditRun, CheckFailure, SkipReason};

mod json;
mod markdown;

pub use json::JsonSink;
pub use markdown::MarkdownSink;

pub const SCHEMA_VERSION: &str = "1.0";

/// Field names whose negative values are highlighted.
const HIGHLIGHT_FIELDS: &[&str] = &["used?", "idle?", "underutilized?", "used in last 30 days"];
const NEGATIVE_VALUES: &[&str] = &["no", "false"];

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl SinkError {
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            SinkError::Io(err) => err.kind() == std::io::ErrorKind::BrokenPipe,
            SinkError::Json(err) => err
                .io_error_kind()
                .is_some_and(|k| k == std::io::ErrorKind::BrokenPipe),
        }
    }
}

/// Run metadata carried next to the report.
#[derive(Debug, Clone, Copy)]
pub struct ReportMeta<'a> {
    pub region: &'a str,
    pub generated_at: OffsetDateTime,
    pub failures: &'a [CheckFailure],
    pub skipped: &'a [(CheckKind, SkipReason)],
}

impl<'a> ReportMeta<'a> {
    pub fn from_run(run: &'a AuditRun) -> Self {
        Self {
            region: &run.region,
            generated_at: run.generated_at,
            failures: &run.failures,
            skipped: &run.skipped,
        }
    }
}

pub trait ReportSink {
    /// Longest sheet label the sink can present, in characters.
    fn max_label_len(&self) -> usize {
        DEFAULT_MAX_LABEL_LEN
    }

    fn write(&mut self, report: &AuditReport, meta: &ReportMeta<'_>) -> Result<(), SinkError>;
}

/// Whether a cell should be highlighted as a negative signal.
pub fn is_highlighted(field: &str, value: &FieldValue) -> bool {
    if !HIGHLIGHT_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(field)) {
        return false;
    }
    let rendered = value.to_string();
    let rendered = rendered.trim();
    NEGATIVE_VALUES.iter().any(|v| v.eq_ignore_ascii_case(rendered))
}
