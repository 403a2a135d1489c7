//! Read-only capability surface the checkers depend on.
//!
//! Each trait covers one service family. Checkers take `&dyn CloudProvider`
//! and never depend on a transport.

mod error;
pub mod snapshot;
mod types;

use time::OffsetDateTime;

pub use error::ProviderError;
pub use snapshot::{LoadError, SnapshotProvider};
pub use types::*;

pub type ProviderResult<T> = Result<T, ProviderError>;

pub trait ComputeApi {
    fn describe_instances(&self) -> ProviderResult<Vec<Instance>>;
    fn describe_volumes(&self) -> ProviderResult<Vec<Volume>>;
    /// Images owned by the account.
    fn describe_images(&self) -> ProviderResult<Vec<Image>>;
    fn describe_addresses(&self) -> ProviderResult<Vec<Address>>;
    /// Snapshots owned by the account.
    fn describe_snapshots(&self) -> ProviderResult<Vec<Snapshot>>;
    fn describe_network_interfaces(&self) -> ProviderResult<Vec<NetworkInterface>>;
    fn describe_reserved_instances(&self) -> ProviderResult<Vec<ReservedInstance>>;
}

pub trait PricingApi {
    /// `location` is the region display name, e.g. `US East (N. Virginia)`.
    fn on_demand_price(&self, instance_type: &str, location: &str) -> ProviderResult<PriceQuote>;
}

pub trait TelemetryApi {
    fn get_metric_statistics(&self, query: &MetricQuery) -> ProviderResult<Vec<Datapoint>>;
}

pub trait ServerlessApi {
    fn list_functions(&self) -> ProviderResult<Vec<FunctionConfiguration>>;
    fn get_function_configuration(&self, name: &str) -> ProviderResult<FunctionConfiguration>;
    fn list_event_source_mappings(&self, name: &str) -> ProviderResult<Vec<EventSourceMapping>>;
    /// `None` when the function has no resource policy.
    fn get_function_policy(&self, name: &str) -> ProviderResult<Option<String>>;
}

pub trait ObjectStoreApi {
    fn list_buckets(&self) -> ProviderResult<Vec<Bucket>>;
    /// `None` means the default region.
    fn bucket_location(&self, bucket: &str) -> ProviderResult<Option<String>>;
    /// `None` when versioning was never configured.
    fn bucket_versioning(&self, bucket: &str) -> ProviderResult<Option<String>>;
    fn bucket_acl(&self, bucket: &str) -> ProviderResult<Vec<Grant>>;
    /// `None` when no lifecycle configuration exists.
    fn bucket_lifecycle(&self, bucket: &str) -> ProviderResult<Option<Vec<LifecycleRule>>>;
    /// `None` when access logging is disabled.
    fn bucket_logging(&self, bucket: &str) -> ProviderResult<Option<LoggingTarget>>;
    fn list_objects(&self, bucket: &str, token: Option<&str>) -> ProviderResult<ObjectPage>;
}

pub trait AuditTrailApi {
    fn lookup_bucket_events(
        &self,
        bucket: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ProviderResult<Vec<TrailEvent>>;
}

pub trait DatabaseApi {
    fn describe_db_instances(&self) -> ProviderResult<Vec<DbInstance>>;
    fn list_db_tags(&self, arn: &str) -> ProviderResult<Vec<Tag>>;
    fn describe_manual_db_snapshots(&self) -> ProviderResult<Vec<DbSnapshot>>;
    fn top_sql_query(
        &self,
        arn: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ProviderResult<InsightsOutcome>;
    fn describe_db_proxies(&self) -> ProviderResult<Vec<DbProxy>>;
}

pub trait FileSystemApi {
    fn describe_file_systems(&self) -> ProviderResult<Vec<FileSystem>>;
    fn file_system_tags(&self, id: &str) -> ProviderResult<Vec<Tag>>;
    fn describe_mount_targets(&self, id: &str) -> ProviderResult<Vec<MountTarget>>;
    fn lifecycle_policies(&self, id: &str) -> ProviderResult<Vec<LifecyclePolicy>>;
}

/// Everything an audit run needs from one account/region.
pub trait CloudProvider:
    ComputeApi
    + PricingApi
    + TelemetryApi
    + ServerlessApi
    + ObjectStoreApi
    + AuditTrailApi
    + DatabaseApi
    + FileSystemApi
{
    /// Cheap call run once before any checker.
    fn verify_credentials(&self) -> ProviderResult<()>;
}
