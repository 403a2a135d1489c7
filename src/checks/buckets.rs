use time::{Duration, OffsetDateTime};

use crate::checks::{CheckContext, CheckError, fatal};
use crate::core::timestamp::{age_days, format_date};
use crate::core::{CheckResult, FieldValue, FindingSet, Record, round2};
use crate::provider::{ObjectStoreApi, ProviderResult, StoredObject};

const DEFAULT_REGION: &str = "us-east-1";
const RECENT_UPLOAD_DAYS: i64 = 30;
const OLD_DATA_DAYS: i64 = 365;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Public,
    Private,
    Unknown,
}

impl Exposure {
    fn as_str(self) -> &'static str {
        match self {
            Exposure::Public => "Yes",
            Exposure::Private => "No",
            Exposure::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessFrequency {
    LogsEnabled,
    AccessedViaTrail,
    Unknown,
}

impl AccessFrequency {
    fn as_str(self) -> &'static str {
        match self {
            AccessFrequency::LogsEnabled => "Logs enabled",
            AccessFrequency::AccessedViaTrail => "Accessed (via audit trail)",
            AccessFrequency::Unknown => "Unknown",
        }
    }
}

/// Object statistics gathered from a full listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStats {
    pub count: u64,
    pub total_bytes: u64,
    pub newest: Option<OffsetDateTime>,
    pub oldest: Option<OffsetDateTime>,
}

impl ObjectStats {
    pub fn add(&mut self, object: &StoredObject) {
        self.count += 1;
        self.total_bytes += object.size;
        let at = object.last_modified;
        self.newest = Some(self.newest.map_or(at, |n| n.max(at)));
        self.oldest = Some(self.oldest.map_or(at, |o| o.min(at)));
    }

    pub fn size_gb(&self) -> f64 {
        round2(self.total_bytes as f64 / BYTES_PER_GB)
    }
}

/// Walks every page of the bucket listing.
pub fn collect_object_stats<S: ObjectStoreApi + ?Sized>(
    store: &S,
    bucket: &str,
) -> ProviderResult<ObjectStats> {
    let mut stats = ObjectStats::default();
    let mut token: Option<String> = None;
    loop {
        let page = store.list_objects(bucket, token.as_deref())?;
        for object in &page.objects {
            stats.add(object);
        }
        match page.next_token {
            Some(next) => token = Some(next),
            None => return Ok(stats),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BucketAudit {
    pub name: String,
    pub region: String,
    pub last_upload: Option<OffsetDateTime>,
    pub total_objects: u64,
    pub total_size_gb: f64,
    pub public: Exposure,
    pub versioning: String,
    pub lifecycle: bool,
    pub access: AccessFrequency,
    pub notes: Vec<String>,
}

impl BucketAudit {
    fn new(name: String) -> Self {
        Self {
            name,
            region: DEFAULT_REGION.to_string(),
            last_upload: None,
            total_objects: 0,
            total_size_gb: 0.0,
            public: Exposure::Unknown,
            versioning: "Disabled".to_string(),
            lifecycle: false,
            access: AccessFrequency::Unknown,
            notes: Vec::new(),
        }
    }

    fn note_error(&mut self, err: impl std::fmt::Display) {
        tracing::warn!(bucket = %self.name, error = %err, "bucket lookup failed");
        self.notes.push(format!("Error analyzing bucket: {err}"));
    }
}

impl Record for BucketAudit {
    const SCHEMA: &'static [&'static str] = &[
        "Bucket Name",
        "Region",
        "Last Object Upload",
        "Total Objects",
        "Total Size (GB)",
        "Public?",
        "Versioning",
        "Lifecycle",
        "Access Frequency",
        "Notes",
    ];

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.name.clone().into(),
            self.region.clone().into(),
            self.last_upload
                .map(format_date)
                .unwrap_or_else(|| "N/A".to_string())
                .into(),
            self.total_objects.into(),
            self.total_size_gb.into(),
            self.public.as_str().into(),
            self.versioning.clone().into(),
            if self.lifecycle { "Enabled" } else { "None" }.into(),
            self.access.as_str().into(),
            FieldValue::List(self.notes.clone()),
        ]
    }
}

/// Notes derived from the listing. `now` anchors the age checks.
pub fn object_notes(stats: &ObjectStats, now: OffsetDateTime) -> Vec<String> {
    let mut notes = Vec::new();
    if stats.count == 0 {
        notes.push("Bucket is empty.".to_string());
        return notes;
    }
    if stats
        .newest
        .is_some_and(|t| age_days(now, t) > RECENT_UPLOAD_DAYS)
    {
        notes.push(format!("No objects added in last {RECENT_UPLOAD_DAYS} days."));
    }
    if stats.oldest.is_some_and(|t| age_days(now, t) > OLD_DATA_DAYS) {
        notes.push("Contains data older than 1 year.".to_string());
    }
    notes
}

fn access_frequency(ctx: &CheckContext<'_>, audit: &mut BucketAudit) {
    match ctx.provider.bucket_logging(&audit.name) {
        Ok(Some(_)) => audit.access = AccessFrequency::LogsEnabled,
        Ok(None) => {
            let start = ctx.now - Duration::days(RECENT_UPLOAD_DAYS);
            match ctx.provider.lookup_bucket_events(&audit.name, start, ctx.now) {
                Ok(events) if !events.is_empty() => {
                    audit.access = AccessFrequency::AccessedViaTrail;
                }
                Ok(_) => {}
                Err(err) => audit.note_error(err),
            }
        }
        Err(err) => audit.note_error(err),
    }
    if audit.access == AccessFrequency::Unknown {
        audit
            .notes
            .push("Access frequency unknown. Enable access logs.".to_string());
    }
}

pub fn audit_bucket(ctx: &CheckContext<'_>, name: String) -> BucketAudit {
    let mut audit = BucketAudit::new(name);
    let store = ctx.provider;

    match store.bucket_location(&audit.name) {
        Ok(Some(region)) if !region.is_empty() => audit.region = region,
        Ok(_) => {}
        Err(err) => audit.note_error(err),
    }

    // Exposure leads the notes.
    match store.bucket_acl(&audit.name) {
        Ok(grants) => {
            if grants.iter().any(|g| g.is_all_users()) {
                audit.public = Exposure::Public;
                audit.notes.push("Bucket is publicly accessible.".to_string());
            } else {
                audit.public = Exposure::Private;
            }
        }
        Err(err) => audit.note_error(err),
    }

    match collect_object_stats(store, &audit.name) {
        Ok(stats) => {
            audit.total_objects = stats.count;
            audit.total_size_gb = stats.size_gb();
            audit.last_upload = stats.newest;
            let notes = object_notes(&stats, ctx.now);
            audit.notes.extend(notes);
        }
        Err(err) => audit.note_error(err),
    }

    match store.bucket_versioning(&audit.name) {
        Ok(Some(status)) => audit.versioning = status,
        Ok(None) => {}
        Err(err) => audit.note_error(err),
    }

    match store.bucket_lifecycle(&audit.name) {
        Ok(rules) => audit.lifecycle = rules.is_some_and(|r| !r.is_empty()),
        Err(err) => audit.note_error(err),
    }

    access_frequency(ctx, &mut audit);
    audit
}

pub fn audit_buckets(ctx: &CheckContext<'_>) -> Result<CheckResult, CheckError> {
    let buckets = ctx
        .provider
        .list_buckets()
        .map_err(fatal("bucket audit"))?;

    let rows: Vec<BucketAudit> = buckets
        .into_iter()
        .map(|b| audit_bucket(ctx, b.name))
        .collect();

    tracing::info!(
        count = rows.len(),
        public = rows.iter().filter(|r| r.public == Exposure::Public).count(),
        "buckets audited"
    );
    Ok(CheckResult::Flat(FindingSet::from_records(rows)))
}
