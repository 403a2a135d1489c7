use serde::Serialize;

use crate::core::FindingSet;

/// Sheet-name limit of the legacy spreadsheet format.
pub const DEFAULT_MAX_LABEL_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub label: String,
    #[serde(flatten)]
    pub findings: FindingSet,
}

/// Sink-ready mapping of sheet label to findings, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AuditReport {
    sheets: Vec<Sheet>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, label: String, findings: FindingSet) {
        self.sheets.push(Sheet { label, findings });
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn get(&self, label: &str) -> Option<&FindingSet> {
        self.sheets
            .iter()
            .find(|s| s.label == label)
            .map(|s| &s.findings)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn total_findings(&self) -> usize {
        self.sheets.iter().map(|s| s.findings.len()).sum()
    }
}

/// Truncates by characters so multi-byte labels never split.
pub fn truncate_label(label: &str, max_chars: usize) -> String {
    label.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_label_counts_chars() {
        assert_eq!(truncate_label("RDS - Snapshots", 31), "RDS - Snapshots");
        assert_eq!(truncate_label("abcdef", 3), "abc");
        assert_eq!(truncate_label("ääää", 2), "ää");
    }
}
