use crate::core::FindingSet;

/// Raw output of one checker.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Flat(FindingSet),
    /// Sub-category name to findings, in presentation order.
    Nested(Vec<(String, FindingSet)>),
}

impl CheckResult {
    pub fn empty() -> Self {
        CheckResult::Flat(FindingSet::default())
    }

    pub fn nested(parts: impl IntoIterator<Item = (&'static str, FindingSet)>) -> Self {
        CheckResult::Nested(
            parts
                .into_iter()
                .map(|(name, set)| (name.to_string(), set))
                .collect(),
        )
    }

    pub fn total_findings(&self) -> usize {
        match self {
            CheckResult::Flat(set) => set.len(),
            CheckResult::Nested(parts) => parts.iter().map(|(_, set)| set.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_findings() == 0
    }

    pub fn sub_category(&self, name: &str) -> Option<&FindingSet> {
        match self {
            CheckResult::Flat(_) => None,
            CheckResult::Nested(parts) => parts
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, set)| set),
        }
    }
}
