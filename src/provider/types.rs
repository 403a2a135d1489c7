use serde::Deserialize;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

pub fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.key == key)
        .map(|t| t.value.as_str())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub state: String,
    #[serde(with = "time::serde::rfc3339")]
    pub launch_time: OffsetDateTime,
    pub instance_type: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub volume_id: String,
    pub size: u32,
    pub state: String,
    #[serde(with = "time::serde::rfc3339")]
    pub create_time: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EbsBlockDevice {
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDeviceMapping {
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub virtual_name: Option<String>,
    #[serde(default)]
    pub ebs: Option<EbsBlockDevice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub image_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Provider-formatted, e.g. `2024-01-31T10:15:30.000000Z`.
    pub creation_date: String,
    #[serde(default)]
    pub root_device_type: Option<String>,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub allocation_id: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub network_interface_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    pub volume_size: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInterface {
    pub network_interface_id: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservedInstance {
    pub reserved_instances_id: String,
    pub instance_type: String,
    pub availability_zone: String,
    pub instance_count: u32,
    pub state: String,
}

/// Answer of a best-effort price lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceQuote {
    Hourly { usd: String },
    Unavailable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Layer {
    pub arn: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeadLetterConfig {
    #[serde(default)]
    pub target_arn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfiguration {
    pub function_name: String,
    pub function_arn: String,
    #[serde(default)]
    pub runtime: Option<String>,
    pub memory_size: u32,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub dead_letter_config: Option<DeadLetterConfig>,
    #[serde(default)]
    pub provisioned_concurrent_executions: Option<u32>,
    #[serde(default)]
    pub reserved_concurrent_executions: Option<u32>,
}

impl FunctionConfiguration {
    pub fn has_dead_letter_target(&self) -> bool {
        self.dead_letter_config
            .as_ref()
            .and_then(|d| d.target_arn.as_deref())
            .is_some_and(|arn| !arn.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSourceMapping {
    #[serde(default)]
    pub event_source_arn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grant {
    #[serde(default)]
    pub grantee_uri: Option<String>,
    #[serde(default)]
    pub grantee_id: Option<String>,
    pub permission: String,
}

impl Grant {
    pub fn is_all_users(&self) -> bool {
        self.grantee_uri
            .as_deref()
            .is_some_and(|uri| uri.ends_with("AllUsers"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleRule {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingTarget {
    pub target_bucket: String,
    #[serde(default)]
    pub target_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<StoredObject>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrailEvent {
    pub event_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub event_time: OffsetDateTime,
    pub resource_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbInstance {
    pub identifier: String,
    pub arn: String,
    pub engine: String,
    pub instance_class: String,
    #[serde(default)]
    pub allocated_storage: Option<u32>,
    #[serde(default)]
    pub multi_az: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbSnapshot {
    pub identifier: String,
    pub db_instance_identifier: String,
    #[serde(with = "time::serde::rfc3339")]
    pub create_time: OffsetDateTime,
    #[serde(default)]
    pub allocated_storage: Option<u32>,
    pub snapshot_type: String,
}

/// Query-insight lookup result. `NotEnabled` is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightsOutcome {
    TopQuery(Option<String>),
    NotEnabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbProxy {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub role_arn: String,
    #[serde(default)]
    pub associated_db_clusters: Vec<String>,
    #[serde(default)]
    pub associated_db_instances: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSystem {
    pub file_system_id: String,
    #[serde(default)]
    pub encrypted: Option<bool>,
    #[serde(default)]
    pub performance_mode: Option<String>,
    #[serde(default)]
    pub throughput_mode: Option<String>,
    /// Set for One Zone file systems.
    #[serde(default)]
    pub availability_zone_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MountTarget {
    pub mount_target_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecyclePolicy {
    #[serde(default)]
    pub transition_to_ia: Option<String>,
    #[serde(default)]
    pub transition_to_primary_storage_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Maximum,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One "get metric statistics" request.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension: Dimension,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub period: Duration,
    pub statistics: Vec<Statistic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Datapoint {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub sum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl Datapoint {
    pub fn value(&self, stat: Statistic) -> Option<f64> {
        match stat {
            Statistic::Average => self.average,
            Statistic::Sum => self.sum,
            Statistic::Maximum => self.maximum,
        }
    }
}
