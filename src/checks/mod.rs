//! Resource checkers. Each is stateless and read-only: it lists provider
//! state, applies one classification rule and returns typed finding rows.
//!
//! A checker returns `Err(CheckError)` only when its primary listing call
//! fails. Failures of per-item detail calls are logged and degrade to safe
//! defaults inside the checker.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::CheckResult;
use crate::metrics::MetricAverager;
use crate::provider::{CloudProvider, ProviderError};

pub mod buckets;
pub mod compute;
pub mod cost;
pub mod database;
pub mod filesystem;
pub mod reservations;
pub mod serverless;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    pub idle_days: u32,
    pub cpu_percent: f64,
    pub network_out_bytes: f64,
    pub image_age_days: u32,
    pub function_window_days: u32,
    pub database_window_days: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            idle_days: 7,
            cpu_percent: 5.0,
            network_out_bytes: 5_000_000.0,
            image_age_days: 30,
            function_window_days: 30,
            database_window_days: 7,
        }
    }
}

/// Everything one checker invocation needs.
pub struct CheckContext<'a> {
    pub provider: &'a dyn CloudProvider,
    pub region: &'a str,
    pub now: OffsetDateTime,
    pub thresholds: &'a Thresholds,
}

impl<'a> CheckContext<'a> {
    pub fn metrics(&self) -> MetricAverager<'a, dyn CloudProvider + 'a> {
        MetricAverager::new(self.provider)
    }
}

/// The checker's primary listing failed; the family reports nothing.
#[derive(Debug, Error)]
#[error("{check}: {source}")]
pub struct CheckError {
    pub check: &'static str,
    #[source]
    pub source: ProviderError,
}

pub(crate) fn fatal(check: &'static str) -> impl FnOnce(ProviderError) -> CheckError {
    move |source| CheckError { check, source }
}

/// Resource families in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckKind {
    IdleInstances,
    UnattachedVolumes,
    StaleImages,
    UnusedAddresses,
    OrphanSnapshots,
    UnattachedInterfaces,
    UnusedReservations,
    InstanceStoreImages,
    CostEstimates,
    Functions,
    Buckets,
    Databases,
    FileSystems,
}

impl CheckKind {
    pub const ALL: [CheckKind; 13] = [
        CheckKind::IdleInstances,
        CheckKind::UnattachedVolumes,
        CheckKind::StaleImages,
        CheckKind::UnusedAddresses,
        CheckKind::OrphanSnapshots,
        CheckKind::UnattachedInterfaces,
        CheckKind::UnusedReservations,
        CheckKind::InstanceStoreImages,
        CheckKind::CostEstimates,
        CheckKind::Functions,
        CheckKind::Buckets,
        CheckKind::Databases,
        CheckKind::FileSystems,
    ];

    /// Report label of the family.
    pub const fn label(self) -> &'static str {
        match self {
            CheckKind::IdleInstances => "EC2 - Idle Instances",
            CheckKind::UnattachedVolumes => "EBS - Unattached Volumes",
            CheckKind::StaleImages => "AMIs - Old",
            CheckKind::UnusedAddresses => "Elastic IPs - Unused",
            CheckKind::OrphanSnapshots => "Snapshots - Orphaned",
            CheckKind::UnattachedInterfaces => "ENIs - Unattached",
            CheckKind::UnusedReservations => "Reserved Instances - Unused",
            CheckKind::InstanceStoreImages => "AMIs - Instance Store",
            CheckKind::CostEstimates => "EC2 - Cost Estimates",
            CheckKind::Functions => "Lambda - Functions",
            CheckKind::Buckets => "S3 - Buckets",
            CheckKind::Databases => "RDS",
            CheckKind::FileSystems => "EFS - File Systems",
        }
    }

    /// Stable key used in configuration.
    pub const fn key(self) -> &'static str {
        match self {
            CheckKind::IdleInstances => "idle-instances",
            CheckKind::UnattachedVolumes => "unattached-volumes",
            CheckKind::StaleImages => "stale-images",
            CheckKind::UnusedAddresses => "unused-addresses",
            CheckKind::OrphanSnapshots => "orphan-snapshots",
            CheckKind::UnattachedInterfaces => "unattached-interfaces",
            CheckKind::UnusedReservations => "unused-reservations",
            CheckKind::InstanceStoreImages => "instance-store-images",
            CheckKind::CostEstimates => "cost-estimates",
            CheckKind::Functions => "functions",
            CheckKind::Buckets => "buckets",
            CheckKind::Databases => "databases",
            CheckKind::FileSystems => "file-systems",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.key().eq_ignore_ascii_case(key))
    }

    pub fn run(self, ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
        match self {
            CheckKind::IdleInstances => compute::idle_instances(ctx),
            CheckKind::UnattachedVolumes => compute::unattached_volumes(ctx),
            CheckKind::StaleImages => compute::stale_images(ctx),
            CheckKind::UnusedAddresses => compute::unassociated_addresses(ctx),
            CheckKind::OrphanSnapshots => compute::orphan_snapshots(ctx),
            CheckKind::UnattachedInterfaces => compute::unattached_interfaces(ctx),
            CheckKind::UnusedReservations => reservations::unused_reservations(ctx),
            CheckKind::InstanceStoreImages => compute::instance_store_images(ctx),
            CheckKind::CostEstimates => cost::running_instance_costs(ctx),
            CheckKind::Functions => serverless::audit_functions(ctx),
            CheckKind::Buckets => buckets::audit_buckets(ctx),
            CheckKind::Databases => Ok(database::audit_databases(ctx)),
            CheckKind::FileSystems => filesystem::audit_file_systems(ctx),
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_and_are_unique() {
        let mut keys: Vec<&str> = CheckKind::ALL.iter().map(|k| k.key()).collect();
        for kind in CheckKind::ALL {
            assert_eq!(CheckKind::from_key(kind.key()), Some(kind));
        }
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), CheckKind::ALL.len());
    }

    #[test]
    fn labels_fit_sheet_limit() {
        for kind in CheckKind::ALL {
            assert!(kind.label().chars().count() <= crate::core::DEFAULT_MAX_LABEL_LEN);
        }
    }
}
