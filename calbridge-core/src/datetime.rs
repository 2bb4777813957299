//! iCalendar date/time values and timezone lookup.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// `20240315T090000Z`
pub const ICS_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
/// `20240315T090000`, interpreted in a TZID or the ambient zone
pub const ICS_LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
/// `20240315`
pub const ICS_DATE_FORMAT: &str = "%Y%m%d";

/// Prefixes some clients put in front of IANA names in TZID values.
const TZID_PREFIXES: [&str; 3] = ["/mozilla.org/20050126_1/", "/mozilla.org/", "/softwarestudio.org/"];

/// Resolve a TZID to an IANA timezone.
///
/// Returns `None` when the identifier is unknown to the timezone database.
pub fn resolve_timezone(tzid: &str) -> Option<Tz> {
    let tzid = tzid.trim().trim_matches('"');
    let stripped = TZID_PREFIXES
        .iter()
        .find_map(|prefix| tzid.strip_prefix(prefix))
        .unwrap_or(tzid);

    stripped.parse::<Tz>().ok()
}

/// Whether a DTSTART/DTEND value carries a date without a time component.
pub fn is_date_only(value: &str) -> bool {
    value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Convert an iCalendar date or date-time value to a UTC instant.
///
/// Values ending in `Z` are UTC. Floating date-times and plain dates are
/// interpreted in `tz` (dates at local midnight).
pub fn make_utc_date(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, ICS_UTC_FORMAT) {
        return Some(dt.and_utc());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, ICS_LOCAL_FORMAT) {
        return local_to_utc(dt, tz);
    }

    if let Ok(d) = NaiveDate::parse_from_str(value, ICS_DATE_FORMAT) {
        return local_to_utc(d.and_hms_opt(0, 0, 0)?, tz);
    }

    None
}

/// Resolve a wall-clock time in `tz` to UTC.
///
/// Ambiguous times (DST fold) take the earlier instant. Times inside a DST gap
/// are moved forward by an hour, which is what clients display for them.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format(ICS_UTC_FORMAT).to_string()
}

/// Format the calendar date of `dt` as seen in `tz` (for all-day values).
pub fn format_local_date(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format(ICS_DATE_FORMAT).to_string()
}
