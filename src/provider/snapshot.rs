//! Provider backed by a JSON inventory of account state.
//!
//! The document mirrors what the describe/list calls would return, plus the
//! telemetry datapoints, prices and audit-trail events the checkers query.
//! `fail` lists operation names (optionally `operation:target`) that should
//! return a call error, and `auth_error` makes the credential check fail.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

use super::*;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Inventory {
    auth_error: Option<String>,
    fail: BTreeSet<String>,
    compute: ComputeInventory,
    prices: Vec<PriceEntry>,
    functions: Vec<FunctionEntry>,
    buckets: Vec<BucketEntry>,
    object_page_size: Option<usize>,
    trail_events: Vec<TrailEvent>,
    databases: DatabaseInventory,
    file_systems: Vec<FileSystemEntry>,
    metrics: Vec<MetricSeries>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComputeInventory {
    instances: Vec<Instance>,
    volumes: Vec<Volume>,
    images: Vec<Image>,
    addresses: Vec<Address>,
    snapshots: Vec<Snapshot>,
    network_interfaces: Vec<NetworkInterface>,
    reserved_instances: Vec<ReservedInstance>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    instance_type: String,
    location: String,
    #[serde(default)]
    usd_per_hour: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    #[serde(flatten)]
    configuration: FunctionConfiguration,
    #[serde(default)]
    event_source_mappings: Vec<EventSourceMapping>,
    #[serde(default)]
    policy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    name: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    versioning: Option<String>,
    #[serde(default)]
    grants: Vec<Grant>,
    #[serde(default)]
    lifecycle_rules: Option<Vec<LifecycleRule>>,
    #[serde(default)]
    logging: Option<LoggingTarget>,
    #[serde(default)]
    objects: Vec<StoredObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseInventory {
    instances: Vec<DbInstanceEntry>,
    snapshots: Vec<DbSnapshot>,
    proxies: Vec<DbProxy>,
}

#[derive(Debug, Deserialize)]
struct DbInstanceEntry {
    #[serde(flatten)]
    instance: DbInstance,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    insights: Option<InsightsEntry>,
}

#[derive(Debug, Deserialize)]
struct InsightsEntry {
    #[serde(default)]
    top_query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileSystemEntry {
    #[serde(flatten)]
    file_system: FileSystem,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    mount_targets: Vec<MountTarget>,
    #[serde(default)]
    lifecycle_policies: Vec<LifecyclePolicy>,
}

#[derive(Debug, Deserialize)]
struct MetricSeries {
    namespace: String,
    metric_name: String,
    dimension: Dimension,
    #[serde(default)]
    datapoints: Vec<Datapoint>,
}

#[derive(Debug)]
pub struct SnapshotProvider {
    inv: Inventory,
}

impl SnapshotProvider {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let s = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&s)
    }

    pub fn from_json_str(s: &str) -> Result<Self, LoadError> {
        Ok(Self {
            inv: serde_json::from_str(s)?,
        })
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, LoadError> {
        Ok(Self {
            inv: serde_json::from_value(value)?,
        })
    }

    fn gate(&self, operation: &str, target: Option<&str>) -> ProviderResult<()> {
        if self.inv.fail.contains(operation) {
            return Err(ProviderError::call(operation, "injected failure"));
        }
        if let Some(target) = target {
            if self.inv.fail.contains(&format!("{operation}:{target}")) {
                return Err(ProviderError::call(
                    operation,
                    format!("injected failure for {target}"),
                ));
            }
        }
        Ok(())
    }

    fn bucket(&self, operation: &str, name: &str) -> ProviderResult<&BucketEntry> {
        self.gate(operation, Some(name))?;
        self.inv
            .buckets
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| ProviderError::not_found(operation, name))
    }

    fn function(&self, operation: &str, name: &str) -> ProviderResult<&FunctionEntry> {
        self.gate(operation, Some(name))?;
        self.inv
            .functions
            .iter()
            .find(|f| f.configuration.function_name == name)
            .ok_or_else(|| ProviderError::not_found(operation, name))
    }

    fn file_system(&self, operation: &str, id: &str) -> ProviderResult<&FileSystemEntry> {
        self.gate(operation, Some(id))?;
        self.inv
            .file_systems
            .iter()
            .find(|f| f.file_system.file_system_id == id)
            .ok_or_else(|| ProviderError::not_found(operation, id))
    }

    fn db_instance(&self, operation: &str, arn: &str) -> ProviderResult<&DbInstanceEntry> {
        self.gate(operation, Some(arn))?;
        self.inv
            .databases
            .instances
            .iter()
            .find(|d| d.instance.arn == arn)
            .ok_or_else(|| ProviderError::not_found(operation, arn))
    }
}

impl ComputeApi for SnapshotProvider {
    fn describe_instances(&self) -> ProviderResult<Vec<Instance>> {
        self.gate("describe_instances", None)?;
        Ok(self.inv.compute.instances.clone())
    }

    fn describe_volumes(&self) -> ProviderResult<Vec<Volume>> {
        self.gate("describe_volumes", None)?;
        Ok(self.inv.compute.volumes.clone())
    }

    fn describe_images(&self) -> ProviderResult<Vec<Image>> {
        self.gate("describe_images", None)?;
        Ok(self.inv.compute.images.clone())
    }

    fn describe_addresses(&self) -> ProviderResult<Vec<Address>> {
        self.gate("describe_addresses", None)?;
        Ok(self.inv.compute.addresses.clone())
    }

    fn describe_snapshots(&self) -> ProviderResult<Vec<Snapshot>> {
        self.gate("describe_snapshots", None)?;
        Ok(self.inv.compute.snapshots.clone())
    }

    fn describe_network_interfaces(&self) -> ProviderResult<Vec<NetworkInterface>> {
        self.gate("describe_network_interfaces", None)?;
        Ok(self.inv.compute.network_interfaces.clone())
    }

    fn describe_reserved_instances(&self) -> ProviderResult<Vec<ReservedInstance>> {
        self.gate("describe_reserved_instances", None)?;
        Ok(self.inv.compute.reserved_instances.clone())
    }
}

impl PricingApi for SnapshotProvider {
    fn on_demand_price(&self, instance_type: &str, location: &str) -> ProviderResult<PriceQuote> {
        self.gate("get_products", Some(instance_type))?;
        let quote = self
            .inv
            .prices
            .iter()
            .find(|p| p.instance_type == instance_type && p.location == location)
            .and_then(|p| p.usd_per_hour.clone())
            .map(|usd| PriceQuote::Hourly { usd })
            .unwrap_or(PriceQuote::Unavailable);
        Ok(quote)
    }
}

impl TelemetryApi for SnapshotProvider {
    fn get_metric_statistics(&self, query: &MetricQuery) -> ProviderResult<Vec<Datapoint>> {
        self.gate("get_metric_statistics", Some(&query.metric_name))?;
        let points = self
            .inv
            .metrics
            .iter()
            .filter(|m| {
                m.namespace == query.namespace
                    && m.metric_name == query.metric_name
                    && m.dimension == query.dimension
            })
            .flat_map(|m| m.datapoints.iter())
            .filter(|d| d.timestamp >= query.start && d.timestamp <= query.end)
            .cloned()
            .collect();
        Ok(points)
    }
}

impl ServerlessApi for SnapshotProvider {
    fn list_functions(&self) -> ProviderResult<Vec<FunctionConfiguration>> {
        self.gate("list_functions", None)?;
        Ok(self
            .inv
            .functions
            .iter()
            .map(|f| f.configuration.clone())
            .collect())
    }

    fn get_function_configuration(&self, name: &str) -> ProviderResult<FunctionConfiguration> {
        Ok(self
            .function("get_function_configuration", name)?
            .configuration
            .clone())
    }

    fn list_event_source_mappings(&self, name: &str) -> ProviderResult<Vec<EventSourceMapping>> {
        Ok(self
            .function("list_event_source_mappings", name)?
            .event_source_mappings
            .clone())
    }

    fn get_function_policy(&self, name: &str) -> ProviderResult<Option<String>> {
        Ok(self.function("get_policy", name)?.policy.clone())
    }
}

impl ObjectStoreApi for SnapshotProvider {
    fn list_buckets(&self) -> ProviderResult<Vec<Bucket>> {
        self.gate("list_buckets", None)?;
        Ok(self
            .inv
            .buckets
            .iter()
            .map(|b| Bucket {
                name: b.name.clone(),
            })
            .collect())
    }

    fn bucket_location(&self, bucket: &str) -> ProviderResult<Option<String>> {
        Ok(self.bucket("get_bucket_location", bucket)?.location.clone())
    }

    fn bucket_versioning(&self, bucket: &str) -> ProviderResult<Option<String>> {
        Ok(self.bucket("get_bucket_versioning", bucket)?.versioning.clone())
    }

    fn bucket_acl(&self, bucket: &str) -> ProviderResult<Vec<Grant>> {
        Ok(self.bucket("get_bucket_acl", bucket)?.grants.clone())
    }

    fn bucket_lifecycle(&self, bucket: &str) -> ProviderResult<Option<Vec<LifecycleRule>>> {
        Ok(self
            .bucket("get_bucket_lifecycle_configuration", bucket)?
            .lifecycle_rules
            .clone())
    }

    fn bucket_logging(&self, bucket: &str) -> ProviderResult<Option<LoggingTarget>> {
        Ok(self.bucket("get_bucket_logging", bucket)?.logging.clone())
    }

    fn list_objects(&self, bucket: &str, token: Option<&str>) -> ProviderResult<ObjectPage> {
        let entry = self.bucket("list_objects_v2", bucket)?;
        let page_size = self.inv.object_page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let start = match token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| ProviderError::call("list_objects_v2", format!("bad token: {t}")))?,
            None => 0,
        };
        let end = (start + page_size).min(entry.objects.len());
        let objects = entry.objects.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < entry.objects.len()).then(|| end.to_string());
        Ok(ObjectPage {
            objects,
            next_token,
        })
    }
}

impl AuditTrailApi for SnapshotProvider {
    fn lookup_bucket_events(
        &self,
        bucket: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ProviderResult<Vec<TrailEvent>> {
        self.gate("lookup_events", Some(bucket))?;
        Ok(self
            .inv
            .trail_events
            .iter()
            .filter(|e| e.resource_name == bucket && e.event_time >= start && e.event_time <= end)
            .cloned()
            .collect())
    }
}

impl DatabaseApi for SnapshotProvider {
    fn describe_db_instances(&self) -> ProviderResult<Vec<DbInstance>> {
        self.gate("describe_db_instances", None)?;
        Ok(self
            .inv
            .databases
            .instances
            .iter()
            .map(|d| d.instance.clone())
            .collect())
    }

    fn list_db_tags(&self, arn: &str) -> ProviderResult<Vec<Tag>> {
        Ok(self.db_instance("list_tags_for_resource", arn)?.tags.clone())
    }

    fn describe_manual_db_snapshots(&self) -> ProviderResult<Vec<DbSnapshot>> {
        self.gate("describe_db_snapshots", None)?;
        Ok(self
            .inv
            .databases
            .snapshots
            .iter()
            .filter(|s| s.snapshot_type == "manual")
            .cloned()
            .collect())
    }

    fn top_sql_query(
        &self,
        arn: &str,
        _start: OffsetDateTime,
        _end: OffsetDateTime,
    ) -> ProviderResult<InsightsOutcome> {
        let entry = self.db_instance("describe_dimension_keys", arn)?;
        Ok(match &entry.insights {
            Some(insights) => InsightsOutcome::TopQuery(insights.top_query.clone()),
            None => InsightsOutcome::NotEnabled,
        })
    }

    fn describe_db_proxies(&self) -> ProviderResult<Vec<DbProxy>> {
        self.gate("describe_db_proxies", None)?;
        Ok(self.inv.databases.proxies.clone())
    }
}

impl FileSystemApi for SnapshotProvider {
    fn describe_file_systems(&self) -> ProviderResult<Vec<FileSystem>> {
        self.gate("describe_file_systems", None)?;
        Ok(self
            .inv
            .file_systems
            .iter()
            .map(|f| f.file_system.clone())
            .collect())
    }

    fn file_system_tags(&self, id: &str) -> ProviderResult<Vec<Tag>> {
        Ok(self.file_system("describe_tags", id)?.tags.clone())
    }

    fn describe_mount_targets(&self, id: &str) -> ProviderResult<Vec<MountTarget>> {
        Ok(self
            .file_system("describe_mount_targets", id)?
            .mount_targets
            .clone())
    }

    fn lifecycle_policies(&self, id: &str) -> ProviderResult<Vec<LifecyclePolicy>> {
        Ok(self
            .file_system("describe_lifecycle_configuration", id)?
            .lifecycle_policies
            .clone())
    }
}

impl CloudProvider for SnapshotProvider {
    fn verify_credentials(&self) -> ProviderResult<()> {
        match &self.inv.auth_error {
            Some(msg) => Err(ProviderError::Authentication(msg.clone())),
            None => Ok(()),
        }
    }
}
