use crate::checks::{CheckContext, CheckError, fatal};
use crate::core::{CheckResult, FieldValue, FindingSet, Record};
use crate::provider::{PriceQuote, PricingApi};

const UNKNOWN: &str = "Unknown";

/// Display names the price catalogue uses for locations.
const REGION_NAMES: &[(&str, &str)] = &[
    ("us-east-1", "US East (N. Virginia)"),
    ("us-east-2", "US East (Ohio)"),
    ("us-west-1", "US West (N. California)"),
    ("us-west-2", "US West (Oregon)"),
    ("ca-central-1", "Canada (Central)"),
    ("eu-west-1", "EU (Ireland)"),
    ("eu-west-2", "EU (London)"),
    ("eu-west-3", "EU (Paris)"),
    ("eu-central-1", "EU (Frankfurt)"),
    ("eu-north-1", "EU (Stockholm)"),
    ("eu-south-1", "EU (Milan)"),
    ("ap-south-1", "Asia Pacific (Mumbai)"),
    ("ap-northeast-1", "Asia Pacific (Tokyo)"),
    ("ap-northeast-2", "Asia Pacific (Seoul)"),
    ("ap-northeast-3", "Asia Pacific (Osaka)"),
    ("ap-southeast-1", "Asia Pacific (Singapore)"),
    ("ap-southeast-2", "Asia Pacific (Sydney)"),
    ("ap-east-1", "Asia Pacific (Hong Kong)"),
    ("sa-east-1", "South America (Sao Paulo)"),
    ("me-south-1", "Middle East (Bahrain)"),
    ("af-south-1", "Africa (Cape Town)"),
];

pub fn region_display_name(region: &str) -> Option<&'static str> {
    REGION_NAMES
        .iter()
        .find(|(code, _)| *code == region)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone)]
pub struct InstanceCost {
    pub id: String,
    pub instance_type: String,
    pub availability_zone: String,
    pub price: String,
}

impl Record for InstanceCost {
    const SCHEMA: &'static [&'static str] = &[
        "Resource ID",
        "Instance Type",
        "Availability Zone",
        "Price Info",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.clone().into(),
            self.instance_type.clone().into(),
            self.availability_zone.clone().into(),
            self.price.clone().into(),
        ]
    }
}

/// Best-effort on-demand price. Every failure mode reads as `Unknown`.
pub fn price_info<P: PricingApi + ?Sized>(pricing: &P, instance_type: &str, region: &str) -> String {
    let Some(location) = region_display_name(region) else {
        tracing::debug!(region, "no price catalogue name for region");
        return UNKNOWN.to_string();
    };
    match pricing.on_demand_price(instance_type, location) {
        Ok(PriceQuote::Hourly { usd }) => format!("${usd}/hr (on-demand)"),
        Ok(PriceQuote::Unavailable) => UNKNOWN.to_string(),
        Err(err) => {
            tracing::warn!(instance_type, error = %err, "price lookup failed");
            UNKNOWN.to_string()
        }
    }
}

pub fn running_instance_costs(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let instances = ctx
        .provider
        .describe_instances()
        .map_err(fatal("cost estimates"))?;

    let rows: Vec<InstanceCost> = instances
        .into_iter()
        .filter(|i| i.state == "running")
        .map(|i| InstanceCost {
            price: price_info(ctx.provider, &i.instance_type, ctx.region),
            id: i.instance_id,
            instance_type: i.instance_type,
            availability_zone: i.availability_zone,
        })
        .collect();

    tracing::info!(count = rows.len(), "running instance cost estimates");
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}
