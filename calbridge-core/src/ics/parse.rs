//! iCalendar to appointment decoding.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::appointment::{
    Appointment, AppointmentException, Attendee, BusyStatus, EventDetails, MeetingStatus,
    Sensitivity,
};
use crate::datetime::{is_date_only, make_utc_date, resolve_timezone};
use crate::error::{CoreError, CoreResult};
use crate::ics::component::{CalendarComponent, CalendarProperty, parse_calendar};
use crate::recurrence::Recurrence;
use crate::timezone::timezone_string;

/// Decode calendar text into an appointment.
///
/// Only empty input is an error. Malformed text, unknown properties and
/// unresolvable timezones are logged and produce a partially filled
/// appointment. Floating times without a TZID are read in `default_tz`;
/// `truncation` caps the body size in bytes.
pub fn decode_appointment(data: &str, truncation: usize, default_tz: Tz) -> CoreResult<Appointment> {
    let root = match parse_calendar(data) {
        Ok(root) => root,
        Err(CoreError::IcsParse(e)) => {
            tracing::warn!(error = %e, "Unparseable calendar data, returning empty appointment");
            return Ok(Appointment::default());
        }
        Err(e) => return Err(e),
    };

    let mut appointment = Appointment::default();
    let decoder = Decoder {
        truncation,
        default_tz,
        exception_tz: default_tz,
    };

    // The first VTIMEZONE names the appointment's timezone; floating
    // RECURRENCE-ID values are read in it
    let decoder = match root
        .components_named("VTIMEZONE")
        .next()
        .and_then(|tz| tz.property("TZID"))
    {
        Some(tzid) => {
            appointment.timezone = Some(timezone_string(&tzid.value, true));
            Decoder {
                exception_tz: resolve_timezone(&tzid.value).unwrap_or(default_tz),
                ..decoder
            }
        }
        None => decoder,
    };

    for component in root.components.iter().filter(|c| c.name() != "VTIMEZONE") {
        decoder.visit(component, &mut appointment);
    }

    Ok(appointment)
}

struct Decoder {
    truncation: usize,
    default_tz: Tz,
    exception_tz: Tz,
}

impl Decoder {
    fn visit(&self, component: &CalendarComponent, appointment: &mut Appointment) {
        if let Some(recurrence_id) = component.property("RECURRENCE-ID") {
            let exception = self.decode_exception(component, recurrence_id);
            appointment.exceptions.push(exception);
            return;
        }

        self.decode_details(component, &mut appointment.details);

        for exdate in component.properties_named("EXDATE") {
            appointment.exceptions.extend(self.decode_exdates(exdate));
        }

        // Exceptions written nested inside their master event
        for child in component.components_named("VEVENT") {
            if let Some(recurrence_id) = child.property("RECURRENCE-ID") {
                let exception = self.decode_exception(child, recurrence_id);
                appointment.exceptions.push(exception);
            }
        }
    }

    fn decode_exception(
        &self,
        component: &CalendarComponent,
        recurrence_id: &CalendarProperty,
    ) -> AppointmentException {
        let mut exception = AppointmentException {
            exception_start_time: self.timestamp(recurrence_id, self.exception_tz),
            deleted: false,
            details: EventDetails::default(),
        };
        self.decode_details(component, &mut exception.details);
        exception
    }

    /// Each EXDATE value is an occurrence removed from the series.
    fn decode_exdates(&self, prop: &CalendarProperty) -> Vec<AppointmentException> {
        let tz = self.zone_for(prop, self.exception_tz);
        prop.value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .filter_map(|value| {
                let start = make_utc_date(value, tz);
                if start.is_none() {
                    tracing::warn!(value, "Unparseable EXDATE value");
                }
                start
            })
            .map(|start| AppointmentException {
                exception_start_time: Some(start),
                deleted: true,
                details: EventDetails::default(),
            })
            .collect()
    }

    fn decode_details(&self, component: &CalendarComponent, details: &mut EventDetails) {
        details.busy_status = Some(BusyStatus::Busy);

        for prop in &component.properties {
            let value = prop.value.as_str();
            match prop.name.as_str() {
                "LAST-MODIFIED" => details.dtstamp = self.timestamp(prop, self.default_tz),
                "DTSTART" => {
                    details.start_time = self.timestamp(prop, self.default_tz);
                    if is_date_only(value) {
                        details.all_day = true;
                    }
                }
                "DTEND" => {
                    details.end_time = self.timestamp(prop, self.default_tz);
                    if is_date_only(value) {
                        details.all_day = true;
                    }
                }
                "SUMMARY" => details.subject = Some(value.to_string()),
                "UID" => details.uid = Some(value.to_string()),
                "LOCATION" => details.location = Some(value.to_string()),
                "ORGANIZER" => {
                    let address = parse_address(prop);
                    if address.name.is_some() {
                        details.organizer_name = address.name;
                    }
                    if address.email.is_some() {
                        details.organizer_email = address.email;
                    }
                }
                "ATTENDEE" => details.attendees.push(parse_address(prop)),
                "RRULE" => details.recurrence = Some(Recurrence::parse(value, self.default_tz)),
                "CLASS" => match Sensitivity::from_ics_str(value) {
                    Some(sensitivity) => details.sensitivity = Some(sensitivity),
                    None => tracing::debug!(value, "Unknown CLASS value"),
                },
                "TRANSP" => match BusyStatus::from_ics_str(value) {
                    Some(busy) => details.busy_status = Some(busy),
                    None => tracing::debug!(value, "Unknown TRANSP value"),
                },
                "STATUS" => match MeetingStatus::from_ics_str(value) {
                    Some(status) => details.meeting_status = Some(status),
                    None => tracing::debug!(value, "Unknown STATUS value"),
                },
                "DESCRIPTION" => {
                    let (body, truncated) = truncate_body(value, self.truncation);
                    details.body = Some(body);
                    details.body_truncated = truncated;
                }
                // Already unescaped, so a comma inside one category splits it
                "CATEGORIES" => details.categories.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string),
                ),
                // Handled by the caller
                "RECURRENCE-ID" | "EXDATE" => {}
                other => tracing::debug!(property = other, "Property is not supported"),
            }
        }

        if let Some(alarm) = component.components_named("VALARM").next() {
            match alarm.property("TRIGGER").and_then(|t| parse_trigger_minutes(&t.value)) {
                Some(minutes) => details.reminder = Some(minutes),
                None => tracing::debug!("VALARM without a relative TRIGGER"),
            }
        }
    }

    /// Zone named by the property's TZID parameter, or `fallback`.
    fn zone_for(&self, prop: &CalendarProperty, fallback: Tz) -> Tz {
        match prop.param("TZID") {
            Some(tzid) => resolve_timezone(tzid).unwrap_or_else(|| {
                tracing::warn!(tzid, property = %prop.name, "Unknown TZID, using default timezone");
                fallback
            }),
            None => fallback,
        }
    }

    fn timestamp(&self, prop: &CalendarProperty, fallback: Tz) -> Option<DateTime<Utc>> {
        let tz = self.zone_for(prop, fallback);
        let parsed = make_utc_date(&prop.value, tz);
        if parsed.is_none() {
            tracing::warn!(property = %prop.name, value = %prop.value, "Unparseable date value");
        }
        parsed
    }
}

/// Parse an ORGANIZER or ATTENDEE property.
///
/// The CN parameter gives the name. The value is read as a `KEY=VALUE;...`
/// list after turning the `MAILTO:` scheme into a `MAILTO=` entry, so both
/// `mailto:jane@example.com` and `CN=Jane:MAILTO:jane@example.com` work.
fn parse_address(prop: &CalendarProperty) -> Attendee {
    let mut attendee = Attendee {
        name: prop.param("CN").map(str::to_string),
        email: None,
    };

    for entry in normalize_mailto(&prop.value).split(';') {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_uppercase().as_str() {
            "CN" => attendee.name = Some(value.to_string()),
            "MAILTO" => attendee.email = Some(value.to_string()),
            _ => {}
        }
    }

    attendee
}

/// Rewrite every `mailto:` (any case, optionally preceded by `:`) as
/// `;MAILTO=`.
fn normalize_mailto(value: &str) -> String {
    const SCHEME: &str = "mailto:";

    let lower = value.to_ascii_lowercase();
    let mut out = String::with_capacity(value.len());
    let mut rest = 0;

    while let Some(pos) = lower[rest..].find(SCHEME) {
        let start = rest + pos;
        let head = &value[rest..start];
        out.push_str(head.strip_suffix(':').unwrap_or(head));
        out.push_str(";MAILTO=");
        rest = start + SCHEME.len();
    }
    out.push_str(&value[rest..]);
    out
}

/// Parse a relative TRIGGER value (`-PT15M`, `-P1D`) to minutes before the
/// start.
fn parse_trigger_minutes(value: &str) -> Option<u32> {
    let duration = iso8601::duration(value.trim().trim_start_matches(['-', '+'])).ok()?;
    let std_duration: std::time::Duration = duration.into();
    u32::try_from(std_duration.as_secs() / 60).ok()
}

/// Cut `body` to at most `limit` bytes on a character boundary, then
/// normalise line breaks to CRLF.
fn truncate_body(body: &str, limit: usize) -> (String, bool) {
    let (kept, truncated) = if body.len() > limit {
        let mut end = limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        (&body[..end], true)
    } else {
        (body, false)
    };

    (kept.replace('\r', "").replace('\n', "\r\n"), truncated)
}
