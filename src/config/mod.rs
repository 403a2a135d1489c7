use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::checks::{CheckKind, Thresholds};
use crate::core::DEFAULT_MAX_LABEL_LEN;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub audit: AuditConfig,
    pub thresholds: Thresholds,
    pub ui: UiConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditConfig {
    pub region: String,
    /// Family keys that are not run.
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportConfig {
    pub max_label_len: usize,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            audit: AuditConfig {
                region: "us-east-1".to_string(),
                disabled: Vec::new(),
            },
            thresholds: Thresholds::default(),
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            report: ReportConfig {
                max_label_len: DEFAULT_MAX_LABEL_LEN,
            },
        }
    }
}

impl EffectiveConfig {
    /// Disabled families, rejecting unknown keys.
    pub fn disabled_kinds(&self) -> Result<Vec<CheckKind>> {
        self.audit
            .disabled
            .iter()
            .map(|key| {
                CheckKind::from_key(key).with_context(|| {
                    format!("unknown check `{key}` in audit.disabled (see `cloud-audit checks`)")
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    audit: Option<RawAuditConfig>,
    thresholds: Option<RawThresholds>,
    ui: Option<RawUiConfig>,
    report: Option<RawReportConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuditConfig {
    region: Option<String>,
    disabled: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThresholds {
    idle_days: Option<u32>,
    cpu_percent: Option<f64>,
    network_out_bytes: Option<f64>,
    image_age_days: Option<u32>,
    function_window_days: Option<u32>,
    database_window_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReportConfig {
    max_label_len: Option<usize>,
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .context("HOME is not set")
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/cloud-audit/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(audit) = raw.audit {
        if let Some(region) = audit.region {
            cfg.audit.region = region;
        }
        if let Some(disabled) = audit.disabled {
            cfg.audit.disabled = disabled;
        }
    }

    if let Some(t) = raw.thresholds {
        let th = &mut cfg.thresholds;
        if let Some(v) = t.idle_days {
            th.idle_days = v;
        }
        if let Some(v) = t.cpu_percent {
            th.cpu_percent = v;
        }
        if let Some(v) = t.network_out_bytes {
            th.network_out_bytes = v;
        }
        if let Some(v) = t.image_age_days {
            th.image_age_days = v;
        }
        if let Some(v) = t.function_window_days {
            th.function_window_days = v;
        }
        if let Some(v) = t.database_window_days {
            th.database_window_days = v;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(report) = raw.report {
        if let Some(max_label_len) = report.max_label_len {
            cfg.report.max_label_len = max_label_len;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(v) => Ok(Some(v.trim().parse::<T>().with_context(|| name.to_string())?)),
        Err(_) => Ok(None),
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("CLOUD_AUDIT_REGION") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.audit.region = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("CLOUD_AUDIT_DISABLED") {
        cfg.audit.disabled = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_IDLE_DAYS")? {
        cfg.thresholds.idle_days = v;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_CPU_PERCENT")? {
        cfg.thresholds.cpu_percent = v;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_NETWORK_OUT_BYTES")? {
        cfg.thresholds.network_out_bytes = v;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_IMAGE_AGE_DAYS")? {
        cfg.thresholds.image_age_days = v;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_FUNCTION_WINDOW_DAYS")? {
        cfg.thresholds.function_window_days = v;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_DATABASE_WINDOW_DAYS")? {
        cfg.thresholds.database_window_days = v;
    }
    if let Ok(v) = std::env::var("CLOUD_AUDIT_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "CLOUD_AUDIT_UI_COLOR")?;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_UI_MAX_TABLE_ROWS")? {
        cfg.ui.max_table_rows = v;
    }
    if let Some(v) = env_parse("CLOUD_AUDIT_REPORT_MAX_LABEL_LEN")? {
        cfg.report.max_label_len = v;
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    if cfg.audit.region.trim().is_empty() {
        anyhow::bail!("audit.region must not be empty");
    }
    if cfg.report.max_label_len < 8 {
        anyhow::bail!(
            "report.max_label_len must be at least 8 (got {})",
            cfg.report.max_label_len
        );
    }
    let t = &cfg.thresholds;
    if !(t.cpu_percent.is_finite() && t.cpu_percent >= 0.0) {
        anyhow::bail!("thresholds.cpu_percent must be a non-negative number");
    }
    if !(t.network_out_bytes.is_finite() && t.network_out_bytes >= 0.0) {
        anyhow::bail!("thresholds.network_out_bytes must be a non-negative number");
    }
    cfg.disabled_kinds()?;
    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (use true|false|1|0|yes|no|on|off)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut cfg = EffectiveConfig::default();
        let raw: RawConfig = toml::from_str(
            r#"
[audit]
region = "eu-west-1"
disabled = ["buckets"]

[thresholds]
idle_days = 14
cpu_percent = 2.5
"#,
        )
        .expect("parse");
        apply_raw_config(&mut cfg, raw);
        assert_eq!(cfg.audit.region, "eu-west-1");
        assert_eq!(cfg.thresholds.idle_days, 14);
        assert_eq!(cfg.thresholds.cpu_percent, 2.5);
        assert_eq!(cfg.thresholds.image_age_days, 30);
        assert_eq!(cfg.disabled_kinds().expect("kinds"), vec![CheckKind::Buckets]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<RawConfig>("[thresholds]\nidle = 3\n").is_err());
    }

    #[test]
    fn file_system_window_is_not_configurable() {
        let parsed = toml::from_str::<RawConfig>("[thresholds]\nfile_system_window_days = 7\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_disabled_check_fails_validation() {
        let mut cfg = EffectiveConfig::default();
        cfg.audit.disabled = vec!["nope".to_string()];
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool(" Yes ").expect("bool"));
        assert!(!parse_bool("off").expect("bool"));
        assert!(parse_bool("maybe").is_err());
    }
}
