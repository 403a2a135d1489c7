mod field;
mod finding;
mod report;
mod result;
pub mod timestamp;

pub use field::{FieldValue, round2};
pub use finding::{Finding, FindingSet, Record};
pub use report::{AuditReport, DEFAULT_MAX_LABEL_LEN, Sheet, truncate_label};
pub use result::CheckResult;
