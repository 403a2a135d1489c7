use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::core::FieldValue;

/// A typed finding row. `SCHEMA` is the header row and `values` must return
/// one value per schema column, in the same order.
pub trait Record {
    const SCHEMA: &'static [&'static str];

    fn values(&self) -> Vec<FieldValue>;
}

static EMPTY: FieldValue = FieldValue::Empty;

/// One normalized row of audit output.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    fields: Vec<(&'static str, FieldValue)>,
}

impl Finding {
    pub fn from_record<R: Record>(record: &R) -> Self {
        let mut values = record.values();
        debug_assert_eq!(values.len(), R::SCHEMA.len(), "record/schema length mismatch");
        values.resize(R::SCHEMA.len(), FieldValue::Empty);
        Self {
            fields: R::SCHEMA.iter().copied().zip(values).collect(),
        }
    }

    /// Case-insensitive lookup. Unknown fields read as `Empty`.
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
            .unwrap_or(&EMPTY)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }
}

impl Serialize for Finding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Findings sharing one schema. Only constructible from a single `Record`
/// type, so every row carries the same columns in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingSet {
    schema: &'static [&'static str],
    findings: Vec<Finding>,
}

impl Default for FindingSet {
    fn default() -> Self {
        Self {
            schema: &[],
            findings: Vec::new(),
        }
    }
}

impl FindingSet {
    pub fn from_records<R: Record>(records: impl IntoIterator<Item = R>) -> Self {
        Self {
            schema: R::SCHEMA,
            findings: records
                .into_iter()
                .map(|r| Finding::from_record(&r))
                .collect(),
        }
    }

    pub fn empty<R: Record>() -> Self {
        Self {
            schema: R::SCHEMA,
            findings: Vec::new(),
        }
    }

    pub fn schema(&self) -> &'static [&'static str] {
        self.schema
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }
}

impl<'a> IntoIterator for &'a FindingSet {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

impl Serialize for FindingSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("FindingSet", 2)?;
        st.serialize_field("columns", self.schema)?;
        st.serialize_field("rows", &self.findings)?;
        st.end()
    }
}
