use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// Parses an image creation date such as `2024-01-31T10:15:30.000000Z`.
pub fn parse_image_creation_date(s: &str) -> Option<OffsetDateTime> {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z");
    if let Ok(dt) = PrimitiveDateTime::parse(s.trim(), &fmt) {
        return Some(dt.assume_utc());
    }
    OffsetDateTime::parse(s.trim(), &Rfc3339).ok()
}

/// Parses RFC 3339 or the `+0000` offset style used by function metadata.
pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }
    let fmt = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
    );
    OffsetDateTime::parse(s, &fmt).ok()
}

pub fn age_days(now: OffsetDateTime, then: OffsetDateTime) -> i64 {
    (now - then).whole_days()
}

pub fn days(n: u32) -> Duration {
    Duration::days(i64::from(n))
}

pub fn format_rfc3339(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

pub fn format_date(dt: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]");
    dt.format(&fmt).unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_microsecond_image_dates() {
        let dt = parse_image_creation_date("2025-12-01T08:30:00.123456Z").expect("parse");
        assert_eq!(dt.unix_timestamp(), datetime!(2025-12-01 08:30:00.123456 UTC).unix_timestamp());
    }

    #[test]
    fn parses_function_last_modified() {
        let dt = parse_timestamp("2025-06-01T12:00:00.000+0000").expect("parse");
        assert_eq!(dt, datetime!(2025-06-01 12:00:00 UTC));
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn age_is_whole_days() {
        let now = datetime!(2026-01-10 12:00:00 UTC);
        assert_eq!(age_days(now, datetime!(2026-01-01 00:00:00 UTC)), 9);
    }
}
