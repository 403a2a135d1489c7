use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::checks::CheckKind;
use crate::core::{AuditReport, FindingSet};
use crate::engine::{AuditRun, SkipReason};
use crate::sink::is_highlighted;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for details");
    let _ = writeln!(
        stderr,
        "  - see `cloud-audit --help` for available commands and options"
    );
}

/// Sheet label / row count table, followed by the first rows of each sheet.
pub fn print_summary(run: &AuditRun, report: &AuditReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();

    let _ = writeln!(
        out,
        "summary: region={}  sheets={}  findings={}",
        run.region,
        report.len(),
        report.total_findings()
    );

    if report.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "No findings.");
    } else {
        let label_w = report
            .labels()
            .map(visible_width_ansi)
            .max()
            .unwrap_or(0)
            .max(visible_width_ansi("Sheet"));
        let _ = writeln!(out);
        let _ = writeln!(out, "{}  {}", pad_end_display("Sheet", label_w), "Rows");
        let _ = writeln!(out, "{}  {}", "-".repeat(label_w), "-".repeat(4));
        for sheet in report.sheets() {
            let _ = writeln!(
                out,
                "{}  {}",
                pad_end_display(&sheet.label, label_w),
                pad_start_display(&sheet.findings.len().to_string(), 4)
            );
        }

        if cfg.verbose {
            for sheet in report.sheets() {
                let _ = writeln!(out);
                let _ = writeln!(out, "{}:", sheet.label);
                print_rows(&mut out, &sheet.findings, cfg.max_table_rows, cfg.color);
            }
        }
    }

    if !run.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "failed checks (reported as empty):");
        for f in &run.failures {
            let _ = writeln!(out, "- {}: {}", f.kind.label(), f.message);
        }
    }

    let cancelled: Vec<CheckKind> = run
        .skipped
        .iter()
        .filter(|(_, r)| *r == SkipReason::Cancelled)
        .map(|(k, _)| *k)
        .collect();
    if !cancelled.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "not run (timeout reached): {}", cancelled.len());
        for kind in cancelled {
            let _ = writeln!(out, "- {}", kind.label());
        }
    }
}

/// The fixed sequence with keys and enabled state.
pub fn print_checks(disabled: &[CheckKind], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    let key_w = CheckKind::ALL
        .iter()
        .map(|k| visible_width_ansi(k.key()))
        .max()
        .unwrap_or(0);
    for (i, kind) in CheckKind::ALL.iter().enumerate() {
        let state = if disabled.contains(kind) {
            " (disabled)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{:>2}. {}  {}{state}",
            i + 1,
            pad_end_display(kind.key(), key_w),
            kind.label()
        );
    }
}

fn print_rows(out: &mut dyn Write, set: &FindingSet, rows: usize, color: bool) {
    let columns = set.schema();
    let shown = set.len().min(rows);
    for finding in set.iter().take(shown) {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| {
                let value = finding.get(col);
                let text = truncate_middle(&value.to_string(), 40);
                let text = if is_highlighted(col, value) {
                    highlight(&text, color)
                } else {
                    text
                };
                format!("{col}={text}")
            })
            .collect();
        let _ = writeln!(out, "- {}", cells.join("  "));
    }
    if set.len() > shown {
        let _ = writeln!(out, "- ... ({} more)", set.len() - shown);
    }
}

fn highlight(s: &str, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    format!("\x1b[31m{s}\x1b[0m")
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();

    format!("{prefix}...{suffix}")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_sequences_have_no_width() {
        assert_eq!(visible_width_ansi("\x1b[31mNo\x1b[0m"), 2);
        assert_eq!(visible_width_ansi("ボリューム"), 10);
    }

    #[test]
    fn truncate_middle_keeps_both_ends() {
        assert_eq!(truncate_middle("abcdefghij", 7), "ab...ij");
        assert_eq!(truncate_middle("short", 7), "short");
    }
}
