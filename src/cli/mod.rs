use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;

use crate::checks::CheckKind;
use crate::config::EffectiveConfig;
use crate::engine::{CancelToken, Engine, EngineOptions};
use crate::provider::SnapshotProvider;
use crate::sink::{JsonSink, MarkdownSink, ReportMeta, ReportSink, SinkError};
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "cloud-audit",
    version,
    about = "Audit a cloud account for idle, orphaned and over-provisioned resources"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Stop starting new checks after this many seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every enabled check and emit the report.
    Audit(AuditArgs),
    /// List the checks in execution order.
    Checks,
    Config(ConfigArgs),
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// JSON inventory of the account to audit.
    #[arg(long)]
    pub snapshot: PathBuf,
    #[arg(long)]
    pub region: Option<String>,
    #[arg(long)]
    pub idle_days: Option<u32>,
    #[arg(long)]
    pub cpu_threshold: Option<f64>,
    #[arg(long)]
    pub network_threshold: Option<f64>,
    #[arg(long)]
    pub image_age_days: Option<u32>,
    /// Check key to skip; repeatable.
    #[arg(long)]
    pub disable: Vec<String>,
    #[arg(long)]
    pub markdown: bool,
    /// Write the report document here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Console,
    Json,
    Markdown,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose, cli.quiet);

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::home_dir().map_err(crate::exit::invalid_args_err)?;
    let env_config_path = std::env::var_os("CLOUD_AUDIT_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match &cli.command {
        Commands::Audit(args) => audit(&cli, args, cfg, &ui_cfg)?,
        Commands::Checks => {
            let disabled = cfg.disabled_kinds().map_err(crate::exit::invalid_args_err)?;
            if cli.json {
                write_json(&check_list(&disabled))?;
            } else {
                crate::ui::print_checks(&disabled, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "cloud-audit", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `cloud-audit config --show`");
            }
        }
    }

    Ok(())
}

fn audit(cli: &Cli, args: &AuditArgs, mut cfg: EffectiveConfig, ui_cfg: &UiConfig) -> Result<()> {
    if cli.json && args.markdown {
        return Err(crate::exit::invalid_args(
            "audit: --json and --markdown cannot be combined",
        ));
    }
    apply_audit_overrides(&mut cfg, args)?;

    let mut disabled = cfg.disabled_kinds().map_err(crate::exit::invalid_args_err)?;
    for key in &args.disable {
        let kind = CheckKind::from_key(key).ok_or_else(|| {
            crate::exit::invalid_args(format!(
                "audit: unknown check `{key}` (see `cloud-audit checks`)"
            ))
        })?;
        disabled.push(kind);
    }

    let provider = SnapshotProvider::load(&args.snapshot)
        .with_context(|| format!("audit: cannot use snapshot {}", args.snapshot.display()))
        .map_err(crate::exit::invalid_args_err)?;

    let cancel = match cli.timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let engine = Engine::new(
        &provider,
        cfg.audit.region.clone(),
        cfg.thresholds.clone(),
        EngineOptions {
            show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json,
            disabled: disabled.into_iter().collect(),
        },
    );

    let run = engine.run(&cancel).map_err(|err| {
        let auth = err.is_authentication();
        let err = anyhow::Error::new(err).context("audit: credential check failed");
        if auth {
            crate::exit::auth_failed_err(err)
        } else {
            err
        }
    })?;

    let format = if args.markdown {
        ReportFormat::Markdown
    } else if cli.json || args.output.is_some() {
        ReportFormat::Json
    } else {
        ReportFormat::Console
    };

    let meta = ReportMeta::from_run(&run);
    match format {
        ReportFormat::Console => {
            let report = run.report(cfg.report.max_label_len);
            crate::ui::print_summary(&run, &report, ui_cfg);
        }
        ReportFormat::Json | ReportFormat::Markdown => {
            let out: Box<dyn io::Write> = match &args.output {
                Some(path) => Box::new(io::BufWriter::new(create_output(path)?)),
                None => Box::new(io::stdout().lock()),
            };
            let mut sink: Box<dyn ReportSink> = match format {
                ReportFormat::Markdown => Box::new(MarkdownSink::new(out)),
                _ => Box::new(JsonSink::new(out)),
            };
            let limit = cfg.report.max_label_len.min(sink.max_label_len());
            let report = run.report(limit);
            match sink.write(&report, &meta) {
                Ok(()) => {}
                Err(err) if err.is_broken_pipe() => return Ok(()),
                Err(err) => return Err(sink_error(err, args.output.as_deref())),
            }
            if args.output.is_some() && !cli.json {
                crate::ui::print_summary(&run, &report, ui_cfg);
            }
        }
    }

    Ok(())
}

fn apply_audit_overrides(cfg: &mut EffectiveConfig, args: &AuditArgs) -> Result<()> {
    if let Some(region) = &args.region {
        let region = region.trim();
        if region.is_empty() {
            return Err(crate::exit::invalid_args("audit: --region must not be empty"));
        }
        cfg.audit.region = region.to_string();
    }
    if let Some(v) = args.idle_days {
        cfg.thresholds.idle_days = v;
    }
    if let Some(v) = args.cpu_threshold {
        if !(v.is_finite() && v >= 0.0) {
            return Err(crate::exit::invalid_args(
                "audit: --cpu-threshold must be a non-negative number",
            ));
        }
        cfg.thresholds.cpu_percent = v;
    }
    if let Some(v) = args.network_threshold {
        if !(v.is_finite() && v >= 0.0) {
            return Err(crate::exit::invalid_args(
                "audit: --network-threshold must be a non-negative number",
            ));
        }
        cfg.thresholds.network_out_bytes = v;
    }
    if let Some(v) = args.image_age_days {
        cfg.thresholds.image_age_days = v;
    }
    Ok(())
}

fn create_output(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path)
        .with_context(|| format!("audit: cannot create output file {}", path.display()))
}

fn sink_error(err: SinkError, output: Option<&Path>) -> anyhow::Error {
    match output {
        Some(path) => anyhow::Error::new(err).context(format!("audit: writing {}", path.display())),
        None => anyhow::Error::new(err),
    }
}

#[derive(Debug, Serialize)]
struct CheckEntry {
    order: usize,
    key: &'static str,
    label: &'static str,
    enabled: bool,
}

fn check_list(disabled: &[CheckKind]) -> Vec<CheckEntry> {
    CheckKind::ALL
        .iter()
        .enumerate()
        .map(|(i, kind)| CheckEntry {
            order: i + 1,
            key: kind.key(),
            label: kind.label(),
            enabled: !disabled.contains(kind),
        })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (use bash|zsh|fish)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_list_marks_disabled() {
        let list = check_list(&[CheckKind::Buckets]);
        assert_eq!(list.len(), CheckKind::ALL.len());
        assert_eq!(list[0].key, "idle-instances");
        assert!(list.iter().all(|e| e.enabled == (e.key != "buckets")));
    }

    #[test]
    fn audit_flags_override_config() {
        let mut cfg = EffectiveConfig::default();
        let args = AuditArgs {
            snapshot: PathBuf::from("inv.json"),
            region: Some("eu-west-1".to_string()),
            idle_days: Some(3),
            cpu_threshold: Some(1.5),
            network_threshold: None,
            image_age_days: None,
            disable: vec![],
            markdown: false,
            output: None,
        };
        apply_audit_overrides(&mut cfg, &args).expect("overrides");
        assert_eq!(cfg.audit.region, "eu-west-1");
        assert_eq!(cfg.thresholds.idle_days, 3);
        assert_eq!(cfg.thresholds.cpu_percent, 1.5);
        assert_eq!(cfg.thresholds.image_age_days, 30);
    }

    #[test]
    fn negative_threshold_is_invalid() {
        let mut cfg = EffectiveConfig::default();
        let args = AuditArgs {
            snapshot: PathBuf::from("inv.json"),
            region: None,
            idle_days: None,
            cpu_threshold: Some(-1.0),
            network_threshold: None,
            image_age_days: None,
            disable: vec![],
            markdown: false,
            output: None,
        };
        let err = apply_audit_overrides(&mut cfg, &args).unwrap_err();
        assert_eq!(crate::exit::exit_code(&err), 2);
    }
}
