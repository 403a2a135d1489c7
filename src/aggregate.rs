//! Flattens per-family check results into the sink-ready report.

use crate::core::{AuditReport, CheckResult, truncate_label};

/// Builds the report from `(family label, result)` pairs, keeping their order.
///
/// Empty flat results and empty sub-categories produce no sheet. Nested
/// sub-categories become `"<family> - <sub-category>"`. Every label is cut to
/// `max_label_len` characters and made unique within that limit with a ` (n)`
/// suffix, or bare digits when the limit is too small for one. Labels keep the
/// truncated form once no suffix fits.
pub fn aggregate<L: AsRef<str>>(
    results: impl IntoIterator<Item = (L, CheckResult)>,
    max_label_len: usize,
) -> AuditReport {
    let mut report = AuditReport::new();
    for (family, result) in results {
        let family = family.as_ref();
        match result {
            CheckResult::Flat(set) => {
                if !set.is_empty() {
                    let label = unique_label(&report, family, max_label_len);
                    report.push(label, set);
                }
            }
            CheckResult::Nested(parts) => {
                for (sub, set) in parts {
                    if set.is_empty() {
                        continue;
                    }
                    let label = unique_label(&report, &format!("{family} - {sub}"), max_label_len);
                    report.push(label, set);
                }
            }
        }
    }
    report
}

fn unique_label(report: &AuditReport, label: &str, max_len: usize) -> String {
    let base = truncate_label(label, max_len);
    if !report.contains(&base) {
        return base;
    }
    for n in 2usize.. {
        let padded = format!(" ({n})");
        let suffix = if padded.chars().count() < max_len {
            padded
        } else {
            n.to_string()
        };
        let Some(keep) = max_len.checked_sub(suffix.len()) else {
            // No room left for a distinguishing suffix.
            break;
        };
        let candidate = format!("{}{suffix}", truncate_label(label, keep));
        if !report.contains(&candidate) {
            return candidate;
        }
    }
    base
}
