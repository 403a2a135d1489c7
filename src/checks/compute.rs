use crate::checks::{CheckContext, CheckError, Thresholds, fatal};
use crate::core::timestamp::{age_days, days, format_rfc3339, parse_image_creation_date};
use crate::core::{CheckResult, FieldValue, FindingSet, Record, round2};
use crate::metrics::MetricWindow;
use crate::provider::{Dimension, Image, Statistic, tag_value};

const EC2_NAMESPACE: &str = "AWS/EC2";

#[derive(Debug, Clone)]
pub struct IdleInstance {
    pub id: String,
    pub name: String,
    pub state: String,
    pub launch_time: String,
    pub idle_days: u32,
    pub cpu_avg: f64,
    pub net_out_avg: f64,
    pub suggestion: &'static str,
}

impl Record for IdleInstance {
    const SCHEMA: &'static [&'static str] = &[
        "Resource ID",
        "Name",
        "State",
        "Launch Time",
        "Idle Days",
        "CPU Avg (%)",
        "NetOut Avg (bytes)",
        "Used?",
        "Suggestion",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.name.clone().into(),
            self.state.clone().into(),
            self.launch_time.clone().into(),
            self.idle_days.into(),
            self.cpu_avg.into(),
            self.net_out_avg.into(),
            "No".into(),
            self.suggestion.into(),
        ]
    }
}

/// Running instances are idle only when both averages are strictly below
/// their thresholds.
pub fn is_idle_running(cpu_avg: f64, net_out_avg: f64, t: &Thresholds) -> bool {
    cpu_avg < t.cpu_percent && net_out_avg < t.network_out_bytes
}

pub fn idle_instances(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let instances = ctx
        .provider
        .describe_instances()
        .map_err(fatal("idle instances"))?;
    let metrics = ctx.metrics();
    let t = ctx.thresholds;

    let mut rows = Vec::new();
    for inst in instances {
        let (cpu_avg, net_out_avg, suggestion) = match inst.state.as_str() {
            "stopped" => (
                0.0,
                0.0,
                "Stopped instance still bills for its volumes. Consider terminating.",
            ),
            "running" => {
                let window = |metric_name: &'static str| MetricWindow {
                    namespace: EC2_NAMESPACE,
                    metric_name,
                    dimension: Dimension::new("InstanceId", inst.instance_id.as_str()),
                    window: days(t.idle_days),
                    now: ctx.now,
                };
                let cpu = metrics.average(&window("CPUUtilization"), Statistic::Average);
                let net = metrics.average(&window("NetworkOut"), Statistic::Average);
                if !is_idle_running(cpu, net, t) {
                    continue;
                }
                (cpu, net, "Review and consider stopping or terminating.")
            }
            _ => continue,
        };

        rows.push(IdleInstance {
            name: tag_value(&inst.tags, "Name").unwrap_or("N/A").to_string(),
            id: inst.instance_id,
            state: inst.state,
            launch_time: format_rfc3339(inst.launch_time),
            idle_days: t.idle_days,
            cpu_avg: round2(cpu_avg),
            net_out_avg: round2(net_out_avg),
            suggestion,
        });
    }

    tracing::info!(count = rows.len(), "idle instances");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[derive(Debug, Clone)]
pub struct UnattachedVolume {
    pub id: String,
    pub size_gib: u32,
    pub state: String,
    pub created: String,
}

impl Record for UnattachedVolume {
    const SCHEMA: &'static [&'static str] = &[
        "Resource ID",
        "Size (GiB)",
        "State",
        "Created Time",
        "Used?",
        "Suggestion",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.size_gib.into(),
            self.state.clone().into(),
            self.created.clone().into(),
            "No".into(),
            "Delete if not needed.".into(),
        ]
    }
}

pub fn unattached_volumes(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let volumes = ctx
        .provider
        .describe_volumes()
        .map_err(fatal("unattached volumes"))?;

    let rows: Vec<UnattachedVolume> = volumes
        .into_iter()
        .filter(|v| v.state == "available")
        .map(|v| UnattachedVolume {
            id: v.volume_id,
            size_gib: v.size,
            state: v.state,
            created: format_rfc3339(v.create_time),
        })
        .collect();

    tracing::info!(count = rows.len(), "unattached volumes");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[derive(Debug, Clone)]
pub struct StaleImage {
    pub id: String,
    pub name: String,
    pub creation_date: String,
    pub snapshot_ids: Vec<String>,
    pub age_days: i64,
}

impl Record for StaleImage {
    const SCHEMA: &'static [&'static str] = &[
        "Resource ID",
        "Name",
        "Creation Date",
        "Snapshot IDs",
        "Age (days)",
        "Used?",
        "Suggestion",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.name.clone().into(),
            self.creation_date.clone().into(),
            FieldValue::List(self.snapshot_ids.clone()),
            self.age_days.into(),
            "Unknown".into(),
            "Deregister AMI and manually delete snapshots if unused.".into(),
        ]
    }
}

fn snapshot_ids(image: &Image) -> Vec<String> {
    image
        .block_device_mappings
        .iter()
        .map(|m| {
            m.ebs
                .as_ref()
                .and_then(|e| e.snapshot_id.clone())
                .unwrap_or_else(|| "N/A".to_string())
        })
        .collect()
}

pub fn stale_images(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let images = ctx
        .provider
        .describe_images()
        .map_err(fatal("stale images"))?;
    let threshold = i64::from(ctx.thresholds.image_age_days);

    let mut rows = Vec::new();
    for image in images {
        let Some(created) = parse_image_creation_date(&image.creation_date) else {
            tracing::warn!(
                image = %image.image_id,
                creation_date = %image.creation_date,
                "unparseable image creation date, skipping"
            );
            continue;
        };
        let age = age_days(ctx.now, created);
        if age <= threshold {
            continue;
        }
        rows.push(StaleImage {
            snapshot_ids: snapshot_ids(&image),
            name: image.name.unwrap_or_else(|| "N/A".to_string()),
            id: image.image_id,
            creation_date: image.creation_date,
            age_days: age,
        });
    }

    tracing::info!(count = rows.len(), "stale images");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[derive(Debug, Clone)]
pub struct UnassociatedAddress {
    pub id: String,
    pub public_ip: String,
    pub domain: String,
}

impl Record for UnassociatedAddress {
    const SCHEMA: &'static [&'static str] =
        &["Resource ID", "Public IP", "Domain", "Used?", "Suggestion"];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.public_ip.clone().into(),
            self.domain.clone().into(),
            "No".into(),
            "Release unused Elastic IP to avoid charges.".into(),
        ]
    }
}

pub fn unassociated_addresses(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let addresses = ctx
        .provider
        .describe_addresses()
        .map_err(fatal("unassociated addresses"))?;

    let rows: Vec<UnassociatedAddress> = addresses
        .into_iter()
        .filter(|a| a.instance_id.is_none() && a.network_interface_id.is_none())
        .map(|a| UnassociatedAddress {
            id: a.allocation_id.unwrap_or_else(|| "N/A".to_string()),
            public_ip: a.public_ip.unwrap_or_default(),
            domain: a.domain.unwrap_or_default(),
        })
        .collect();

    tracing::info!(count = rows.len(), "unassociated addresses");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[derive(Debug, Clone)]
pub struct OrphanSnapshot {
    pub id: String,
    pub volume_id: String,
    pub start_time: String,
    pub size_gib: u32,
    pub description: String,
}

impl Record for OrphanSnapshot {
    const SCHEMA: &'static [&'static str] = &[
        "Resource ID",
        "Volume ID",
        "Start Time",
        "Size (GiB)",
        "Description",
        "Used?",
        "Suggestion",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.volume_id.clone().into(),
            self.start_time.clone().into(),
            self.size_gib.into(),
            self.description.clone().into(),
            "Unknown".into(),
            "Delete if snapshot is orphan and not used by AMI or restore point.".into(),
        ]
    }
}

/// Lists every self-owned snapshot. Orphan status is not cross-checked
/// against images or volumes, hence `Used?=Unknown`.
pub fn orphan_snapshots(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let snapshots = ctx
        .provider
        .describe_snapshots()
        .map_err(fatal("orphan snapshots"))?;

    let rows: Vec<OrphanSnapshot> = snapshots
        .into_iter()
        .map(|s| OrphanSnapshot {
            id: s.snapshot_id,
            volume_id: s.volume_id.unwrap_or_else(|| "N/A".to_string()),
            start_time: format_rfc3339(s.start_time),
            size_gib: s.volume_size,
            description: s.description.unwrap_or_else(|| "N/A".to_string()),
        })
        .collect();

    tracing::info!(count = rows.len(), "snapshots");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[derive(Debug, Clone)]
pub struct UnattachedInterface {
    pub id: String,
    pub description: String,
}

impl Record for UnattachedInterface {
    const SCHEMA: &'static [&'static str] = &["Resource ID", "Description", "Used?", "Suggestion"];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.description.clone().into(),
            "No".into(),
            "Delete the network interface if nothing will attach it again.".into(),
        ]
    }
}

pub fn unattached_interfaces(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let interfaces = ctx
        .provider
        .describe_network_interfaces()
        .map_err(fatal("unattached interfaces"))?;

    let rows: Vec<UnattachedInterface> = interfaces
        .into_iter()
        .filter(|n| n.status == "available")
        .map(|n| UnattachedInterface {
            id: n.network_interface_id,
            description: n.description.unwrap_or_default(),
        })
        .collect();

    tracing::info!(count = rows.len(), "unattached network interfaces");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}

#[derive(Debug, Clone)]
pub struct InstanceStoreImage {
    pub id: String,
    pub name: String,
    pub root_device_type: String,
}

impl Record for InstanceStoreImage {
    const SCHEMA: &'static [&'static str] =
        &["Resource ID", "Name", "Root Device Type", "Suggestion"];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.name.clone().into(),
            self.root_device_type.clone().into(),
            "Instance-store backed image. Rebuild as an EBS-backed AMI or deregister.".into(),
        ]
    }
}

pub fn is_instance_store_backed(image: &Image) -> bool {
    !image.block_device_mappings.iter().any(|m| m.ebs.is_some())
}

pub fn instance_store_images(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let images = ctx
        .provider
        .describe_images()
        .map_err(fatal("instance-store images"))?;

    let rows: Vec<InstanceStoreImage> = images
        .into_iter()
        .filter(is_instance_store_backed)
        .map(|i| InstanceStoreImage {
            id: i.image_id,
            name: i.name.unwrap_or_else(|| "N/A".to_string()),
            root_device_type: i.root_device_type.unwrap_or_else(|| "unknown".to_string()),
        })
        .collect();

    tracing::info!(count = rows.len(), "instance-store images");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}
