use cloud_audit::checks::{CheckContext, CheckKind, Thresholds};
use cloud_audit::core::{CheckResult, FieldValue, FindingSet};
use cloud_audit::provider::SnapshotProvider;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::macros::datetime;

const NOW: OffsetDateTime = datetime!(2026-01-11 00:00 UTC);

fn check(kind: CheckKind, inventory: Value) -> FindingSet {
    check_in("us-east-1", kind, inventory)
}

fn check_in(region: &str, kind: CheckKind, inventory: Value) -> FindingSet {
    check_with(region, &Thresholds::default(), kind, inventory)
}

fn check_with(
    region: &str,
    thresholds: &Thresholds,
    kind: CheckKind,
    inventory: Value,
) -> FindingSet {
    let provider = SnapshotProvider::from_value(inventory).expect("inventory");
    let ctx = CheckContext {
        provider: &provider,
        region,
        now: NOW,
        thresholds,
    };
    match kind.run(&ctx).expect("check runs") {
        CheckResult::Flat(set) => set,
        CheckResult::Nested(_) => panic!("{kind} is nested"),
    }
}

fn ids(set: &FindingSet, column: &str) -> Vec<String> {
    set.iter().map(|f| f.get(column).to_string()).collect()
}

#[test]
fn stale_images_use_strict_whole_day_age() {
    let set = check(
        CheckKind::StaleImages,
        json!({ "compute": { "images": [
            { "image_id": "ami-30", "creation_date": "2025-12-12T00:00:00.000000Z" },
            {
                "image_id": "ami-31",
                "name": "base",
                "creation_date": "2025-12-11T00:00:00.000000Z",
                "block_device_mappings": [
                    { "device_name": "/dev/xvda", "ebs": { "snapshot_id": "snap-1" } },
                    { "device_name": "/dev/xvdb", "virtual_name": "ephemeral0" }
                ]
            },
            { "image_id": "ami-bad", "creation_date": "yesterday" }
        ]}}),
    );
    assert_eq!(ids(&set, "Resource ID"), vec!["ami-31"]);
    let row = &set.findings()[0];
    assert_eq!(row.get("Age (days)"), &FieldValue::Int(31));
    assert_eq!(row.get("Snapshot IDs").to_string(), "snap-1, N/A");
    assert_eq!(row.get("Used?"), &FieldValue::text("Unknown"));
}

#[test]
fn only_available_volumes_and_interfaces_are_flagged() {
    let volumes = check(
        CheckKind::UnattachedVolumes,
        json!({ "compute": { "volumes": [
            { "volume_id": "vol-a", "size": 8, "state": "available", "create_time": "2025-01-01T00:00:00Z" },
            { "volume_id": "vol-b", "size": 8, "state": "in-use", "create_time": "2025-01-01T00:00:00Z" }
        ]}}),
    );
    assert_eq!(ids(&volumes, "Resource ID"), vec!["vol-a"]);
    assert_eq!(volumes.findings()[0].get("Size (GiB)"), &FieldValue::Int(8));

    let enis = check(
        CheckKind::UnattachedInterfaces,
        json!({ "compute": { "network_interfaces": [
            { "network_interface_id": "eni-a", "status": "in-use" },
            { "network_interface_id": "eni-b", "status": "available" }
        ]}}),
    );
    assert_eq!(ids(&enis, "Resource ID"), vec!["eni-b"]);
}

#[test]
fn addresses_without_association_are_flagged() {
    let set = check(
        CheckKind::UnusedAddresses,
        json!({ "compute": { "addresses": [
            { "allocation_id": "eipalloc-1", "public_ip": "203.0.113.1", "domain": "vpc" },
            { "allocation_id": "eipalloc-2", "public_ip": "203.0.113.2", "domain": "vpc", "instance_id": "i-1" },
            { "allocation_id": "eipalloc-3", "public_ip": "203.0.113.3", "domain": "vpc", "network_interface_id": "eni-1" }
        ]}}),
    );
    assert_eq!(ids(&set, "Resource ID"), vec!["eipalloc-1"]);
    assert_eq!(set.findings()[0].get("Public IP"), &FieldValue::text("203.0.113.1"));
}

#[test]
fn every_snapshot_is_listed_without_verification() {
    let set = check(
        CheckKind::OrphanSnapshots,
        json!({ "compute": { "snapshots": [
            { "snapshot_id": "snap-a", "volume_id": "vol-live", "start_time": "2025-02-01T00:00:00Z", "volume_size": 8 },
            { "snapshot_id": "snap-b", "start_time": "2025-02-01T00:00:00Z", "volume_size": 20, "description": "nightly" }
        ]}}),
    );
    assert_eq!(ids(&set, "Resource ID"), vec!["snap-a", "snap-b"]);
    let second = &set.findings()[1];
    assert_eq!(second.get("Volume ID"), &FieldValue::text("N/A"));
    assert_eq!(second.get("Description"), &FieldValue::text("nightly"));
    assert_eq!(second.get("Used?"), &FieldValue::text("Unknown"));
}

#[test]
fn instance_store_images_are_listed() {
    let set = check(
        CheckKind::InstanceStoreImages,
        json!({ "compute": { "images": [
            {
                "image_id": "ami-ebs",
                "creation_date": "2025-12-01T00:00:00.000000Z",
                "root_device_type": "ebs",
                "block_device_mappings": [{ "ebs": { "snapshot_id": "snap-1" } }]
            },
            { "image_id": "ami-is", "creation_date": "2025-12-01T00:00:00.000000Z", "root_device_type": "instance-store" }
        ]}}),
    );
    assert_eq!(ids(&set, "Resource ID"), vec!["ami-is"]);
}

#[test]
fn reservations_without_matching_instances_are_underused() {
    let set = check(
        CheckKind::UnusedReservations,
        json!({ "compute": {
            "reserved_instances": [{
                "reserved_instances_id": "ri-1",
                "instance_type": "m5.large",
                "availability_zone": "us-east-1a",
                "instance_count": 3,
                "state": "active"
            }],
            "instances": [{
                "instance_id": "i-1",
                "state": "running",
                "launch_time": "2025-01-01T00:00:00Z",
                "instance_type": "m5.large",
                "availability_zone": "us-east-1a"
            }]
        }}),
    );
    assert_eq!(set.len(), 1);
    let row = &set.findings()[0];
    assert_eq!(row.get("Reserved Count"), &FieldValue::Int(3));
    assert_eq!(row.get("Used Count"), &FieldValue::Int(1));
}

#[test]
fn cost_estimates_use_catalogue_location() {
    let inventory = json!({
        "compute": { "instances": [{
            "instance_id": "i-1",
            "state": "running",
            "launch_time": "2025-01-01T00:00:00Z",
            "instance_type": "t3.micro",
            "availability_zone": "eu-west-1a"
        }]},
        "prices": [
            { "instance_type": "t3.micro", "location": "EU (Ireland)", "usd_per_hour": "0.0114" }
        ]
    });
    let set = check_in("eu-west-1", CheckKind::CostEstimates, inventory.clone());
    assert_eq!(
        set.findings()[0].get("Price Info"),
        &FieldValue::text("$0.0114/hr (on-demand)")
    );

    let set = check_in("us-east-1", CheckKind::CostEstimates, inventory);
    assert_eq!(set.findings()[0].get("Price Info"), &FieldValue::text("Unknown"));
}

#[test]
fn functions_combine_triggers_metrics_and_suggestions() {
    let set = check(
        CheckKind::Functions,
        json!({
            "functions": [
                {
                    "function_name": "idle-fn",
                    "function_arn": "arn:aws:lambda:us-east-1:123:function:idle-fn",
                    "runtime": "python3.12",
                    "memory_size": 1024,
                    "timeout": 120,
                    "reserved_concurrent_executions": 5,
                    "event_source_mappings": [
                        { "event_source_arn": "arn:aws:sqs:us-east-1:123:queue" }
                    ],
                    "policy": "{\"Statement\":[{\"Principal\":{\"Service\":\"s3.amazonaws.com\"}}]}"
                },
                {
                    "function_name": "busy-fn",
                    "function_arn": "arn:aws:lambda:us-east-1:123:function:busy-fn",
                    "runtime": "nodejs20.x",
                    "memory_size": 128,
                    "last_modified": "2026-01-01T00:00:00.000+0000"
                }
            ],
            "metrics": [
                {
                    "namespace": "AWS/Lambda",
                    "metric_name": "Invocations",
                    "dimension": { "name": "FunctionName", "value": "busy-fn" },
                    "datapoints": [{ "timestamp": "2026-01-05T00:00:00Z", "sum": 42.0 }]
                },
                {
                    "namespace": "AWS/Lambda",
                    "metric_name": "Duration",
                    "dimension": { "name": "FunctionName", "value": "busy-fn" },
                    "datapoints": [{ "timestamp": "2026-01-05T00:00:00Z", "average": 80.0, "maximum": 150.0 }]
                },
                {
                    "namespace": "AWS/Lambda",
                    "metric_name": "Errors",
                    "dimension": { "name": "FunctionName", "value": "busy-fn" },
                    "datapoints": [{ "timestamp": "2026-01-05T00:00:00Z", "sum": 2.0 }]
                }
            ]
        }),
    );
    assert_eq!(set.len(), 2);

    let idle = &set.findings()[0];
    assert_eq!(idle.get("Unused"), &FieldValue::Bool(true));
    assert_eq!(
        idle.get("Triggers").to_string(),
        "arn:aws:sqs:us-east-1:123:queue, policy:s3.amazonaws.com"
    );
    let FieldValue::List(suggestions) = idle.get("Suggestions") else {
        panic!("suggestions are a list");
    };
    assert_eq!(suggestions.len(), 4);
    assert!(suggestions[0].starts_with("Unused function"));
    assert!(suggestions[1].starts_with("Over-provisioned memory"));
    assert!(suggestions[2].starts_with("Timeout is high"));
    assert_eq!(suggestions[3], "Reserved concurrency (5) set but function is unused.");

    let busy = &set.findings()[1];
    assert_eq!(busy.get("Unused"), &FieldValue::Bool(false));
    assert_eq!(busy.get("Invocations"), &FieldValue::Float(42.0));
    assert_eq!(busy.get("Avg Duration (ms)"), &FieldValue::Float(80.0));
    assert_eq!(busy.get("Last Modified (days ago)"), &FieldValue::Int(10));
    assert_eq!(
        busy.get("Suggestions"),
        &FieldValue::List(vec![
            "Function has errors but no Dead Letter Queue (DLQ) configured.".to_string()
        ])
    );
}

#[test]
fn function_detail_failures_fall_back_to_listing() {
    let set = check(
        CheckKind::Functions,
        json!({
            "fail": ["get_function_configuration:fn", "get_policy:fn"],
            "functions": [{
                "function_name": "fn",
                "function_arn": "arn:aws:lambda:us-east-1:123:function:fn",
                "memory_size": 256
            }]
        }),
    );
    let row = &set.findings()[0];
    assert_eq!(row.get("Memory (MB)"), &FieldValue::Int(256));
    assert_eq!(row.get("Runtime"), &FieldValue::text("N/A"));
    assert_eq!(row.get("Triggers"), &FieldValue::List(vec![]));
}

#[test]
fn bucket_object_listing_spans_pages() {
    let objects: Vec<Value> = (0..5)
        .map(|i| {
            json!({
                "key": format!("k{i}"),
                "size": 1_073_741_824u64,
                "last_modified": format!("2024-0{}-01T00:00:00Z", i + 1)
            })
        })
        .collect();
    let set = check(
        CheckKind::Buckets,
        json!({
            "object_page_size": 2,
            "buckets": [{
                "name": "archive",
                "location": "eu-west-1",
                "versioning": "Enabled",
                "lifecycle_rules": [{ "id": "expire", "status": "Enabled" }],
                "objects": objects
            }]
        }),
    );
    let row = &set.findings()[0];
    assert_eq!(row.get("Total Objects"), &FieldValue::Int(5));
    assert_eq!(row.get("Total Size (GB)"), &FieldValue::Float(5.0));
    assert_eq!(row.get("Region"), &FieldValue::text("eu-west-1"));
    assert_eq!(row.get("Last Object Upload"), &FieldValue::text("2024-05-01"));
    assert_eq!(row.get("Versioning"), &FieldValue::text("Enabled"));
    assert_eq!(row.get("Lifecycle"), &FieldValue::text("Enabled"));
    let notes = row.get("Notes").to_string();
    assert!(notes.contains("No objects added in last 30 days."));
    assert!(notes.contains("Contains data older than 1 year."));
}

#[test]
fn file_systems_report_activity_and_lifecycle() {
    let set = check(
        CheckKind::FileSystems,
        json!({
            "file_systems": [
                {
                    "file_system_id": "fs-idle",
                    "encrypted": false,
                    "performance_mode": "generalPurpose",
                    "throughput_mode": "bursting",
                    "tags": [{ "key": "Name", "value": "shared" }],
                    "mount_targets": [{ "mount_target_id": "mt-1" }, { "mount_target_id": "mt-2" }]
                },
                {
                    "file_system_id": "fs-busy",
                    "availability_zone_name": "us-east-1a",
                    "lifecycle_policies": [{ "transition_to_ia": "AFTER_30_DAYS" }]
                }
            ],
            "metrics": [{
                "namespace": "AWS/EFS",
                "metric_name": "DataWriteIOBytes",
                "dimension": { "name": "FileSystemId", "value": "fs-busy" },
                "datapoints": [{ "timestamp": "2026-01-09T00:00:00Z", "sum": 4096.0 }]
            }]
        }),
    );
    assert_eq!(set.len(), 2);

    let idle = &set.findings()[0];
    assert_eq!(idle.get("Name Tag"), &FieldValue::text("shared"));
    assert_eq!(idle.get("Mount Targets"), &FieldValue::Int(2));
    assert_eq!(idle.get("Used in Last 30 Days"), &FieldValue::text("No"));
    assert_eq!(idle.get("Lifecycle Policies"), &FieldValue::text("None"));
    assert_eq!(
        idle.get("Suggestion"),
        &FieldValue::text(
            "No write activity in last 30 days. | Enable lifecycle policy to move to Infrequent Access. | Consider moving to One Zone if high durability not needed."
        )
    );

    let busy = &set.findings()[1];
    assert_eq!(busy.get("Name Tag"), &FieldValue::text("N/A"));
    assert_eq!(busy.get("Used in Last 30 Days"), &FieldValue::text("Yes"));
    assert_eq!(busy.get("Lifecycle Policies"), &FieldValue::text("AFTER_30_DAYS"));
    assert_eq!(busy.get("Suggestion"), &FieldValue::text("None"));
}

#[test]
fn file_system_writes_look_back_thirty_days_regardless_of_other_windows() {
    let thresholds = Thresholds {
        idle_days: 3,
        function_window_days: 7,
        database_window_days: 7,
        ..Thresholds::default()
    };
    let write = |id: &str, at: &str| {
        json!({
            "namespace": "AWS/EFS",
            "metric_name": "DataWriteIOBytes",
            "dimension": { "name": "FileSystemId", "value": id },
            "datapoints": [{ "timestamp": at, "sum": 4096.0 }]
        })
    };
    let set = check_with(
        "us-east-1",
        &thresholds,
        CheckKind::FileSystems,
        json!({
            "file_systems": [
                { "file_system_id": "fs-10d" },
                { "file_system_id": "fs-40d" }
            ],
            "metrics": [
                write("fs-10d", "2026-01-01T00:00:00Z"),
                write("fs-40d", "2025-12-02T00:00:00Z")
            ]
        }),
    );

    let recent = &set.findings()[0];
    assert_eq!(recent.get("Used in Last 30 Days"), &FieldValue::text("Yes"));
    assert!(
        !recent
            .get("Suggestion")
            .to_string()
            .contains("No write activity")
    );
    let stale = &set.findings()[1];
    assert_eq!(stale.get("Used in Last 30 Days"), &FieldValue::text("No"));
    assert!(
        stale
            .get("Suggestion")
            .to_string()
            .starts_with("No write activity in last 30 days.")
    );
}

#[test]
fn every_row_carries_the_sheet_schema() {
    let set = check(
        CheckKind::Buckets,
        json!({
            "fail": ["get_bucket_versioning:broken"],
            "buckets": [
                { "name": "empty" },
                {
                    "name": "full",
                    "logging": { "target_bucket": "logs" },
                    "objects": [{ "key": "k", "size": 1, "last_modified": "2026-01-10T00:00:00Z" }]
                },
                { "name": "broken" }
            ]
        }),
    );
    assert_eq!(set.len(), 3);
    for finding in set.iter() {
        assert_eq!(finding.field_names().collect::<Vec<_>>(), set.schema());
    }
}

#[test]
fn public_exposure_leads_bucket_notes() {
    let set = check(
        CheckKind::Buckets,
        json!({
            "buckets": [{
                "name": "open-and-empty",
                "grants": [{ "grantee_uri": "http://acs.amazonaws.com/groups/global/AllUsers", "permission": "READ" }],
                "logging": { "target_bucket": "logs" }
            }]
        }),
    );
    let row = &set.findings()[0];
    assert_eq!(row.get("Public?"), &FieldValue::text("Yes"));
    assert_eq!(
        row.get("Notes"),
        &FieldValue::List(vec![
            "Bucket is publicly accessible.".to_string(),
            "Bucket is empty.".to_string(),
        ])
    );
}
