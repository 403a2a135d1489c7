use std::collections::BTreeMap;

use crate::checks::{CheckContext, CheckError, fatal};
use crate::core::{CheckResult, FieldValue, FindingSet, Record};
use crate::provider::{Instance, ReservedInstance};

#[derive(Debug, Clone)]
pub struct UnusedReservation {
    pub instance_type: String,
    pub availability_zone: String,
    pub reserved: u32,
    pub used: u32,
}

impl Record for UnusedReservation {
    const SCHEMA: &'static [&'static str] = &[
        "Instance Type",
        "Availability Zone",
        "Reserved Count",
        "Used Count",
        "Underutilized?",
        "Suggestion",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.instance_type.clone().into(),
            self.availability_zone.clone().into(),
            self.reserved.into(),
            self.used.into(),
            "Yes".into(),
            format!(
                "{} of {} reserved instances unused. Modify or sell the reservation.",
                self.reserved - self.used,
                self.reserved
            )
            .into(),
        ]
    }
}

/// Groups active reservations and running instances by (type, zone) and
/// keeps the groups with fewer running instances than reserved.
pub fn match_reservations(
    reservations: &[ReservedInstance],
    instances: &[Instance],
) -> Vec<UnusedReservation> {
    let mut reserved: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for r in reservations.iter().filter(|r| r.state == "active") {
        *reserved
            .entry((r.instance_type.as_str(), r.availability_zone.as_str()))
            .or_default() += r.instance_count;
    }

    let mut running: BTreeMap<(&str, &str), u32> = BTreeMap::new();
    for i in instances.iter().filter(|i| i.state == "running") {
        *running
            .entry((i.instance_type.as_str(), i.availability_zone.as_str()))
            .or_default() += 1;
    }

    reserved
        .into_iter()
        .filter_map(|((ty, az), count)| {
            let used = running.get(&(ty, az)).copied().unwrap_or(0);
            (used < count).then(|| UnusedReservation {
                instance_type: ty.to_string(),
                availability_zone: az.to_string(),
                reserved: count,
                used,
            })
        })
        .collect()
}

pub fn unused_reservations(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let reservations = ctx
        .provider
        .describe_reserved_instances()
        .map_err(fatal("reservation utilization"))?;
    let instances = ctx
        .provider
        .describe_instances()
        .map_err(fatal("reservation utilization"))?;

    let rows = match_reservations(&reservations, &instances);
    tracing::info!(count = rows.len(), "underused reservations");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}
