use crate::checks::{CheckContext, CheckError, fatal};
use crate::core::timestamp::days;
use crate::core::{CheckResult, FieldValue, FindingSet, Record};
use crate::metrics::MetricWindow;
use crate::provider::{Dimension, FileSystem, LifecyclePolicy, tag_value};

const EFS_NAMESPACE: &str = "AWS/EFS";
/// Lookback named by the `Used in Last 30 Days` column.
pub const WRITE_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone)]
pub struct FileSystemAudit {
    pub id: String,
    pub name: String,
    pub mount_targets: usize,
    pub encrypted: Option<bool>,
    pub performance_mode: Option<String>,
    pub throughput_mode: Option<String>,
    pub lifecycle: String,
    pub recently_written: bool,
    pub suggestions: Vec<&'static str>,
}

impl Record for FileSystemAudit {
    const SCHEMA: &'static [&'static str] = &[
        "File System ID",
        "Name Tag",
        "Mount Targets",
        "Encrypted",
        "Performance Mode",
        "Throughput Mode",
        "Lifecycle Policies",
        "Used in Last 30 Days",
        "Suggestion",
    ];

    fn values(&self) -> Vec<FieldValue> {
        let suggestion = if self.suggestions.is_empty() {
            "None".to_string()
        } else {
            self.suggestions.join(" | ")
        };
        vec![
            self.id.clone().into(),
            self.name.clone().into(),
            (self.mount_targets as u64).into(),
            self.encrypted.map_or(FieldValue::Empty, FieldValue::Bool),
            FieldValue::opt_text(self.performance_mode.clone(), ""),
            FieldValue::opt_text(self.throughput_mode.clone(), ""),
            self.lifecycle.clone().into(),
            FieldValue::yes_no(self.recently_written),
            suggestion.into(),
        ]
    }
}

pub fn infrequent_access_enabled(policies: &[LifecyclePolicy]) -> bool {
    policies.iter().any(|p| p.transition_to_ia.is_some())
}

pub fn lifecycle_summary(policies: &[LifecyclePolicy]) -> String {
    let parts: Vec<&str> = policies
        .iter()
        .filter_map(|p| {
            p.transition_to_ia
                .as_deref()
                .or(p.transition_to_primary_storage_class.as_deref())
        })
        .collect();
    if parts.is_empty() {
        "None".to_string()
    } else {
        parts.join(", ")
    }
}

/// Suggestions in fixed order: write activity, lifecycle, placement.
pub fn suggestions(
    recently_written: bool,
    ia_enabled: bool,
    fs: &FileSystem,
) -> Vec<&'static str> {
    let mut out = Vec::new();
    if !recently_written {
        out.push("No write activity in last 30 days.");
    }
    if !ia_enabled {
        out.push("Enable lifecycle policy to move to Infrequent Access.");
    }
    // Regional file systems have no zone name.
    if fs.availability_zone_name.is_none() {
        out.push("Consider moving to One Zone if high durability not needed.");
    }
    out
}

fn audit_file_system(ctx: &CheckContext<'_>, fs: FileSystem) -> FileSystemAudit {
    let id = fs.file_system_id.clone();
    let provider = ctx.provider;

    let name = match provider.file_system_tags(&id) {
        Ok(tags) => tag_value(&tags, "Name").unwrap_or("N/A").to_string(),
        Err(err) => {
            tracing::warn!(file_system = %id, error = %err, "tags unavailable");
            "N/A".to_string()
        }
    };
    let mount_targets = provider
        .describe_mount_targets(&id)
        .map(|m| m.len())
        .unwrap_or_else(|err| {
            tracing::warn!(file_system = %id, error = %err, "mount targets unavailable");
            0
        });
    let policies = provider.lifecycle_policies(&id).unwrap_or_else(|err| {
        tracing::warn!(file_system = %id, error = %err, "lifecycle configuration unavailable");
        Vec::new()
    });

    let written = ctx.metrics().total(&MetricWindow {
        namespace: EFS_NAMESPACE,
        metric_name: "DataWriteIOBytes",
        dimension: Dimension::new("FileSystemId", id.as_str()),
        window: days(WRITE_WINDOW_DAYS),
        now: ctx.now,
    });
    let recently_written = written > 0.0;
    let suggestions = suggestions(recently_written, infrequent_access_enabled(&policies), &fs);

    FileSystemAudit {
        id,
        name,
        mount_targets,
        encrypted: fs.encrypted,
        performance_mode: fs.performance_mode,
        throughput_mode: fs.throughput_mode,
        lifecycle: lifecycle_summary(&policies),
        recently_written,
        suggestions,
    }
}

pub fn audit_file_systems(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let file_systems = ctx
        .provider
        .describe_file_systems()
        .map_err(fatal("file system audit"))?;

    let rows: Vec<FileSystemAudit> = file_systems
        .into_iter()
        .map(|fs| audit_file_system(ctx, fs))
        .collect();

    tracing::info!(
        count = rows.len(),
        unused = rows.iter().filter(|r| !r.recently_written).count(),
        "file systems audited"
    );
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(zone: Option<&str>) -> FileSystem {
        FileSystem {
            file_system_id: "fs-1".to_string(),
            encrypted: Some(true),
            performance_mode: Some("generalPurpose".to_string()),
            throughput_mode: Some("bursting".to_string()),
            availability_zone_name: zone.map(str::to_string),
        }
    }

    fn ia(after: &str) -> LifecyclePolicy {
        LifecyclePolicy {
            transition_to_ia: Some(after.to_string()),
            transition_to_primary_storage_class: None,
        }
    }

    #[test]
    fn lifecycle_with_ia_is_detected() {
        assert!(infrequent_access_enabled(&[ia("AFTER_30_DAYS")]));
        assert!(!infrequent_access_enabled(&[]));
        assert_eq!(lifecycle_summary(&[ia("AFTER_30_DAYS")]), "AFTER_30_DAYS");
        assert_eq!(lifecycle_summary(&[]), "None");
    }

    #[test]
    fn idle_regional_without_lifecycle_gets_all_suggestions() {
        let out = suggestions(false, false, &fs(None));
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "No write activity in last 30 days.");
    }

    #[test]
    fn active_one_zone_with_lifecycle_has_none() {
        let row = FileSystemAudit {
            id: "fs-1".to_string(),
            name: "N/A".to_string(),
            mount_targets: 1,
            encrypted: Some(true),
            performance_mode: None,
            throughput_mode: None,
            lifecycle: "AFTER_30_DAYS".to_string(),
            recently_written: true,
            suggestions: suggestions(true, true, &fs(Some("us-east-1a"))),
        };
        assert!(row.suggestions.is_empty());
        let values = row.values();
        assert_eq!(values[7], FieldValue::text("Yes"));
        assert_eq!(values[8], FieldValue::text("None"));
    }
}
