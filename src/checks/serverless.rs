use crate::checks::{CheckContext, CheckError, fatal};
use crate::core::timestamp::{age_days, days, parse_timestamp};
use crate::core::{CheckResult, FieldValue, FindingSet, Record, round2};
use crate::metrics::{MetricWindow, max_of, mean_of};
use crate::provider::{Datapoint, Dimension, FunctionConfiguration, Statistic};

const LAMBDA_NAMESPACE: &str = "AWS/Lambda";
const DEFAULT_TIMEOUT_SECS: u32 = 3;
const MAX_LAYERS: usize = 3;
const STALE_AFTER_DAYS: i64 = 180;

#[derive(Debug, Clone, Default)]
pub struct FunctionMetrics {
    pub invocations: Vec<Datapoint>,
    pub duration: Vec<Datapoint>,
    pub errors: Vec<Datapoint>,
}

impl FunctionMetrics {
    pub fn total_invocations(&self) -> f64 {
        self.invocations.iter().filter_map(|d| d.sum).sum()
    }

    pub fn avg_duration_ms(&self) -> f64 {
        mean_of(&self.duration, Statistic::Average).unwrap_or(0.0)
    }

    pub fn max_duration_ms(&self) -> f64 {
        max_of(&self.duration, Statistic::Maximum)
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|d| d.sum.unwrap_or(0.0) > 0.0)
    }
}

/// Signals derived from one function's configuration and metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignals {
    pub unused: bool,
    pub edge: bool,
    pub too_many_layers: bool,
    pub last_modified_days: Option<i64>,
    pub unhandled_errors: bool,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl FunctionSignals {
    pub fn derive(
        config: &FunctionConfiguration,
        metrics: &FunctionMetrics,
        now: time::OffsetDateTime,
    ) -> Self {
        Self {
            unused: metrics.total_invocations() == 0.0,
            edge: is_edge_function(config),
            too_many_layers: config.layers.len() > MAX_LAYERS,
            last_modified_days: config
                .last_modified
                .as_deref()
                .and_then(parse_timestamp)
                .map(|dt| age_days(now, dt)),
            unhandled_errors: metrics.has_errors() && !config.has_dead_letter_target(),
            avg_duration_ms: metrics.avg_duration_ms(),
            max_duration_ms: metrics.max_duration_ms(),
        }
    }
}

pub fn is_edge_function(config: &FunctionConfiguration) -> bool {
    config
        .runtime
        .as_deref()
        .is_some_and(|r| r.starts_with("nodejs"))
        && config.function_arn.contains("cloudfront")
}

/// All applicable suggestions, in fixed order.
pub fn suggestions(config: &FunctionConfiguration, s: &FunctionSignals) -> Vec<String> {
    let mut out = Vec::new();
    let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);

    if s.unused {
        out.push("Unused function. Consider deleting or archiving.".to_string());
    }
    if config.memory_size > 512 && s.avg_duration_ms < 200.0 {
        out.push("Over-provisioned memory. Consider downsizing.".to_string());
    }
    if timeout > 60 && s.max_duration_ms < 1000.0 {
        out.push(
            "Timeout is high relative to max execution duration. Consider reducing it."
                .to_string(),
        );
    }
    if s.too_many_layers {
        out.push("Too many Lambda layers. Consider consolidating.".to_string());
    }
    if config.provisioned_concurrent_executions.unwrap_or(0) > 0 {
        if s.unused {
            out.push(
                "Provisioned concurrency enabled but function is unused, major cost risk."
                    .to_string(),
            );
        } else {
            out.push("Provisioned concurrency enabled. Review usage and cost impact.".to_string());
        }
    }
    if let Some(reserved) = config.reserved_concurrent_executions {
        if s.unused {
            out.push(format!(
                "Reserved concurrency ({reserved}) set but function is unused."
            ));
        }
    }
    if s.unhandled_errors {
        out.push("Function has errors but no Dead Letter Queue (DLQ) configured.".to_string());
    }
    if s.edge {
        out.push("Lambda@Edge function. Review for duplication and necessity.".to_string());
    }
    if s.last_modified_days.is_some_and(|d| d > STALE_AFTER_DAYS) {
        out.push(
            "Function hasn't been modified in over 6 months. Review its relevance.".to_string(),
        );
    }
    out
}

/// Service principals granted access in a resource policy document.
pub fn policy_principals(policy: &str) -> Vec<String> {
    let Ok(doc) = serde_json::from_str::<serde_json::Value>(policy) else {
        return Vec::new();
    };
    let statements = match doc.get("Statement") {
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(single) => vec![single.clone()],
        None => return Vec::new(),
    };

    let mut out = Vec::new();
    for st in statements {
        let Some(service) = st.get("Principal").and_then(|p| p.get("Service")) else {
            continue;
        };
        match service {
            serde_json::Value::String(s) => out.push(s.clone()),
            serde_json::Value::Array(items) => {
                out.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
            _ => {}
        }
    }
    out.sort();
    out.dedup();
    out
}

#[derive(Debug, Clone)]
pub struct FunctionAudit {
    pub name: String,
    pub runtime: Option<String>,
    pub memory_mb: u32,
    pub timeout_secs: Option<u32>,
    pub avg_duration_ms: f64,
    pub invocations: f64,
    pub unused: bool,
    pub edge: bool,
    pub layers: Vec<String>,
    pub triggers: Vec<String>,
    pub last_modified_days: Option<i64>,
    pub provisioned_concurrency: Option<u32>,
    pub reserved_concurrency: Option<u32>,
    pub suggestions: Vec<String>,
}

impl Record for FunctionAudit {
    const SCHEMA: &'static [&'static str] = &[
        "Function Name",
        "Runtime",
        "Memory (MB)",
        "Timeout (s)",
        "Avg Duration (ms)",
        "Invocations",
        "Unused",
        "Edge Function",
        "Layers",
        "Triggers",
        "Last Modified (days ago)",
        "Provisioned Concurrency",
        "Reserved Concurrency",
        "Suggestions",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.name.clone().into(),
            FieldValue::opt_text(self.runtime.clone(), "N/A"),
            self.memory_mb.into(),
            FieldValue::opt_int(self.timeout_secs.map(i64::from)),
            self.avg_duration_ms.into(),
            self.invocations.into(),
            self.unused.into(),
            self.edge.into(),
            FieldValue::List(self.layers.clone()),
            FieldValue::List(self.triggers.clone()),
            FieldValue::opt_int(self.last_modified_days),
            FieldValue::opt_int(self.provisioned_concurrency.map(i64::from)),
            FieldValue::opt_int(self.reserved_concurrency.map(i64::from)),
            FieldValue::List(self.suggestions.clone()),
        ]
    }
}

fn fetch_metrics(ctx: &CheckContext<'_>, name: &str) -> FunctionMetrics {
    let averager = ctx.metrics();
    let window = |metric_name: &'static str| MetricWindow {
        namespace: LAMBDA_NAMESPACE,
        metric_name,
        dimension: Dimension::new("FunctionName", name),
        window: days(ctx.thresholds.function_window_days),
        now: ctx.now,
    };
    let stats = [Statistic::Sum, Statistic::Average, Statistic::Maximum];
    FunctionMetrics {
        invocations: averager.datapoints(&window("Invocations"), &stats),
        duration: averager.datapoints(&window("Duration"), &stats),
        errors: averager.datapoints(&window("Errors"), &stats),
    }
}

fn triggers(ctx: &CheckContext<'_>, name: &str) -> Vec<String> {
    let mut out: Vec<String> = match ctx.provider.list_event_source_mappings(name) {
        Ok(mappings) => mappings
            .into_iter()
            .filter_map(|m| m.event_source_arn)
            .collect(),
        Err(err) => {
            tracing::warn!(function = name, error = %err, "event source mappings unavailable");
            Vec::new()
        }
    };
    match ctx.provider.get_function_policy(name) {
        Ok(Some(policy)) => out.extend(
            policy_principals(&policy)
                .into_iter()
                .map(|p| format!("policy:{p}")),
        ),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(function = name, error = %err, "function policy unavailable");
        }
    }
    out
}

pub fn audit_function(ctx: &CheckContext<'_>, listed: FunctionConfiguration) -> FunctionAudit {
    let name = listed.function_name.clone();
    let config = match ctx.provider.get_function_configuration(&name) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(function = %name, error = %err, "using listed configuration");
            listed
        }
    };
    let triggers = triggers(ctx, &name);
    let metrics = fetch_metrics(ctx, &name);
    let signals = FunctionSignals::derive(&config, &metrics, ctx.now);
    let suggestions = suggestions(&config, &signals);

    FunctionAudit {
        name,
        runtime: config.runtime,
        memory_mb: config.memory_size,
        timeout_secs: config.timeout,
        avg_duration_ms: round2(signals.avg_duration_ms),
        invocations: metrics.total_invocations(),
        unused: signals.unused,
        edge: signals.edge,
        layers: config.layers.into_iter().map(|l| l.arn).collect(),
        triggers,
        last_modified_days: signals.last_modified_days,
        provisioned_concurrency: config.provisioned_concurrent_executions,
        reserved_concurrency: config.reserved_concurrent_executions,
        suggestions,
    }
}

pub fn audit_functions(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let functions = ctx
        .provider
        .list_functions()
        .map_err(fatal("function audit"))?;

    let rows: Vec<FunctionAudit> = functions
        .into_iter()
        .map(|f| audit_function(ctx, f))
        .collect();

    tracing::info!(
        count = rows.len(),
        unused = rows.iter().filter(|r| r.unused).count(),
        "functions audited"
    );
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}
