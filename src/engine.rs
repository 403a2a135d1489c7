use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;

use crate::aggregate::aggregate;
use crate::checks::{CheckContext, CheckKind, Thresholds};
use crate::core::{AuditReport, CheckResult};
use crate::provider::{CloudProvider, ProviderError};

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub show_progress: bool,
    pub disabled: BTreeSet<CheckKind>,
}

/// Cooperative cancellation, checked between checkers only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub kind: CheckKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AuditRun {
    pub region: String,
    pub generated_at: OffsetDateTime,
    /// One entry per executed family, failed families included as empty.
    pub results: Vec<(CheckKind, CheckResult)>,
    pub failures: Vec<CheckFailure>,
    pub skipped: Vec<(CheckKind, SkipReason)>,
}

impl AuditRun {
    pub fn result(&self, kind: CheckKind) -> Option<&CheckResult> {
        self.results
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r)
    }

    pub fn report(&self, max_label_len: usize) -> AuditReport {
        aggregate(
            self.results.iter().map(|(k, r)| (k.label(), r.clone())),
            max_label_len,
        )
    }
}

pub struct Engine<'a> {
    provider: &'a dyn CloudProvider,
    region: String,
    thresholds: Thresholds,
    opts: EngineOptions,
}

impl<'a> Engine<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        region: impl Into<String>,
        thresholds: Thresholds,
        opts: EngineOptions,
    ) -> Self {
        Self {
            provider,
            region: region.into(),
            thresholds,
            opts,
        }
    }

    /// Runs every enabled family in the fixed order.
    pub fn run(&self, cancel: &CancelToken) -> Result<AuditRun, ProviderError> {
        self.run_at(OffsetDateTime::now_utc(), cancel)
    }

    /// Like [`run`](Self::run) with an explicit clock. Credentials are
    /// verified once up front; an error there aborts before any checker.
    pub fn run_at(&self, now: OffsetDateTime, cancel: &CancelToken) -> Result<AuditRun, ProviderError> {
        self.provider.verify_credentials()?;

        let ctx = CheckContext {
            provider: self.provider,
            region: &self.region,
            now,
            thresholds: &self.thresholds,
        };

        use std::io::IsTerminal;
        let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let mut run = AuditRun {
            region: self.region.clone(),
            generated_at: now,
            results: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        };

        for kind in CheckKind::ALL {
            if self.opts.disabled.contains(&kind) {
                tracing::debug!(check = kind.key(), "disabled by configuration");
                run.skipped.push((kind, SkipReason::Disabled));
                continue;
            }
            if cancel.is_cancelled() {
                tracing::warn!(check = kind.key(), "audit cancelled, skipping");
                run.skipped.push((kind, SkipReason::Cancelled));
                continue;
            }
            if let Some(pb) = &pb {
                pb.set_message(format!("checking {}", kind.label()));
            }

            let result = match kind.run(&ctx) {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(check = kind.key(), error = %err, "check failed, reporting empty");
                    run.failures.push(CheckFailure {
                        kind,
                        message: err.to_string(),
                    });
                    CheckResult::empty()
                }
            };
            run.results.push((kind, result));
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(run)
    }
}
