//! Relational-database audit. Four sub-checks, each with its own listing, so
//! one failing listing only empties its own sub-category.

use time::Duration;

use crate::checks::{CheckContext, CheckError, fatal};
use crate::core::timestamp::{age_days, days, format_date};
use crate::core::{CheckResult, FieldValue, FindingSet, Record, round2};
use crate::metrics::MetricWindow;
use crate::provider::{DbInstance, DbProxy, DbSnapshot, Dimension, InsightsOutcome, Statistic, Tag};

const RDS_NAMESPACE: &str = "AWS/RDS";
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const INSIGHTS_WINDOW: Duration = Duration::HOUR;

pub const INSTANCES: &str = "Instances";
pub const SNAPSHOTS: &str = "Snapshots";
pub const PERFORMANCE_INSIGHTS: &str = "Performance Insights";
pub const PROXIES: &str = "Proxies";

#[derive(Debug, Clone)]
pub struct DbUtilization {
    pub identifier: String,
    pub engine: String,
    pub class: String,
    pub allocated_gb: Option<u32>,
    pub cpu_percent: Option<f64>,
    pub used_storage_percent: Option<f64>,
    pub multi_az: bool,
    pub tags: Vec<String>,
}

impl Record for DbUtilization {
    const SCHEMA: &'static [&'static str] = &[
        "DB Identifier",
        "Engine",
        "Class",
        "Allocated (GB)",
        "CPU Utilization (%)",
        "Used Storage (%)",
        "Multi-AZ",
        "Tags",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.identifier.clone().into(),
            self.engine.clone().into(),
            self.class.clone().into(),
            self.allocated_gb.unwrap_or(0).into(),
            FieldValue::opt_float(self.cpu_percent),
            FieldValue::opt_float(self.used_storage_percent),
            self.multi_az.into(),
            FieldValue::List(self.tags.clone()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ManualSnapshot {
    pub snapshot: DbSnapshot,
    pub age_days: i64,
}

impl Record for ManualSnapshot {
    const SCHEMA: &'static [&'static str] = &[
        "Snapshot ID",
        "DB Instance",
        "Created On",
        "Age (days)",
        "Size (GB)",
    ];

    fn values(&self) -> Vec<FieldValue> {
        let s = &self.snapshot;
        vec![
            s.identifier.clone().into(),
            s.db_instance_identifier.clone().into(),
            format_date(s.create_time).into(),
            self.age_days.into(),
            match s.allocated_storage {
                Some(gb) => gb.into(),
                None => "N/A".into(),
            },
        ]
    }
}

#[derive(Debug, Clone)]
pub struct TopQuery {
    pub identifier: String,
    pub query: Option<String>,
}

impl Record for TopQuery {
    const SCHEMA: &'static [&'static str] = &["DB Identifier", "Top Query", "Recommendation"];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.identifier.clone().into(),
            FieldValue::opt_text(self.query.clone(), "N/A"),
            "Consider indexing or optimizing this query.".into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ProxyStatus(pub DbProxy);

impl Record for ProxyStatus {
    const SCHEMA: &'static [&'static str] =
        &["Proxy Name", "Status", "Enabled", "Attached Resources"];

    fn values(&self) -> Vec<FieldValue> {
        let p = &self.0;
        let attached: Vec<String> = p
            .associated_db_clusters
            .iter()
            .chain(&p.associated_db_instances)
            .cloned()
            .collect();
        vec![
            p.name.clone().into(),
            p.status.clone().into(),
            (!p.role_arn.is_empty()).into(),
            FieldValue::List(attached),
        ]
    }
}

/// Percentage of allocated storage in use. Unknown without a free-space
/// reading or an allocation.
pub fn used_storage_percent(free_bytes: Option<f64>, allocated_gb: Option<u32>) -> Option<f64> {
    let free = free_bytes.filter(|f| *f > 0.0)?;
    let total = f64::from(allocated_gb.filter(|a| *a > 0)?) * BYTES_PER_GB;
    Some(round2((1.0 - free / total) * 100.0))
}

fn render_tags(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| format!("{}={}", t.key, t.value)).collect()
}

fn utilization(ctx: &CheckContext<'_>, db: DbInstance) -> DbUtilization {
    let averager = ctx.metrics();
    let window = |metric_name: &'static str| MetricWindow {
        namespace: RDS_NAMESPACE,
        metric_name,
        dimension: Dimension::new("DBInstanceIdentifier", db.identifier.as_str()),
        window: days(ctx.thresholds.database_window_days),
        now: ctx.now,
    };
    let cpu = averager
        .mean(&window("CPUUtilization"), Statistic::Average)
        .map(round2);
    let free = averager.mean(&window("FreeStorageSpace"), Statistic::Average);

    let tags = match ctx.provider.list_db_tags(&db.arn) {
        Ok(tags) => render_tags(&tags),
        Err(err) => {
            tracing::warn!(db = %db.identifier, error = %err, "database tags unavailable");
            Vec::new()
        }
    };

    DbUtilization {
        used_storage_percent: used_storage_percent(free, db.allocated_storage),
        identifier: db.identifier,
        engine: db.engine,
        class: db.instance_class,
        allocated_gb: db.allocated_storage,
        cpu_percent: cpu,
        multi_az: db.multi_az,
        tags,
    }
}

pub fn instance_utilization(ctx: &CheckContext<'_>) -> Result<FindingSet, CheckError> {
    let dbs = ctx
        .provider
        .describe_db_instances()
        .map_err(fatal("database utilization"))?;
    let rows: Vec<DbUtilization> = dbs.into_iter().map(|db| utilization(ctx, db)).collect();
    Ok(FindingSet::from_records(rows))
}

pub fn manual_snapshots(ctx: &CheckContext<'_>) -> Result<FindingSet, CheckError> {
    let snapshots = ctx
        .provider
        .describe_manual_db_snapshots()
        .map_err(fatal("database snapshots"))?;
    let rows = snapshots.into_iter().map(|snapshot| ManualSnapshot {
        age_days: age_days(ctx.now, snapshot.create_time),
        snapshot,
    });
    Ok(FindingSet::from_records(rows))
}

/// Top tokenized statement by load over the last hour. Instances without
/// query insights produce no row.
pub fn top_queries(ctx: &CheckContext<'_>) -> Result<FindingSet, CheckError> {
    let dbs = ctx
        .provider
        .describe_db_instances()
        .map_err(fatal("database query insights"))?;

    let mut rows = Vec::new();
    for db in dbs {
        match ctx
            .provider
            .top_sql_query(&db.arn, ctx.now - INSIGHTS_WINDOW, ctx.now)
        {
            Ok(InsightsOutcome::TopQuery(query)) => rows.push(TopQuery {
                identifier: db.identifier,
                query,
            }),
            Ok(InsightsOutcome::NotEnabled) => {
                tracing::debug!(db = %db.identifier, "query insights not enabled");
            }
            Err(err) => {
                tracing::warn!(db = %db.identifier, error = %err, "query insights unavailable");
            }
        }
    }
    Ok(FindingSet::from_records(rows))
}

pub fn proxies(ctx: &CheckContext<'_>) -> Result<FindingSet, CheckError> {
    let proxies = ctx
        .provider
        .describe_db_proxies()
        .map_err(fatal("database proxies"))?;
    Ok(FindingSet::from_records(
        proxies.into_iter().map(ProxyStatus),
    ))
}

fn or_empty(result: Result<FindingSet, CheckError>) -> FindingSet {
    result.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "database sub-check failed");
        FindingSet::default()
    })
}

pub fn audit_databases(ctx: &CheckContext<'_>) -> CheckResult {
    let result = CheckResult::nested([
        (INSTANCES, or_empty(instance_utilization(ctx))),
        (SNAPSHOTS, or_empty(manual_snapshots(ctx))),
        (PERFORMANCE_INSIGHTS, or_empty(top_queries(ctx))),
        (PROXIES, or_empty(proxies(ctx))),
    ]);
    tracing::info!(count = result.total_findings(), "databases audited");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_storage_from_free_space() {
        let free = 25.0 * BYTES_PER_GB;
        assert_eq!(used_storage_percent(Some(free), Some(100)), Some(75.0));
    }

    #[test]
    fn used_storage_unknown_without_inputs() {
        assert_eq!(used_storage_percent(None, Some(100)), None);
        assert_eq!(used_storage_percent(Some(0.0), Some(100)), None);
        assert_eq!(used_storage_percent(Some(1.0), None), None);
    }

    #[test]
    fn proxy_enabled_follows_role() {
        let row = ProxyStatus(DbProxy {
            name: "p".to_string(),
            status: "available".to_string(),
            role_arn: String::new(),
            associated_db_clusters: vec!["c1".to_string()],
            associated_db_instances: vec!["db1".to_string()],
        });
        let values = row.values();
        assert_eq!(values[2], FieldValue::Bool(false));
        assert_eq!(values[3].to_string(), "c1, db1");
    }

    #[test]
    fn tags_render_as_pairs() {
        let tags = vec![Tag {
            key: "env".to_string(),
            value: "prod".to_string(),
        }];
        assert_eq!(render_tags(&tags), vec!["env=prod".to_string()]);
    }
}
