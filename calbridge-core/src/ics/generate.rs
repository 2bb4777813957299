//! Appointment to iCalendar encoding.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger, ValueType};

use crate::appointment::{Appointment, Attendee, EventDetails};
use crate::datetime::{format_local_date, format_utc};

pub const PRODID: &str = "-//calbridge//NONSGML calbridge Calendar//EN";

/// Encode an appointment as a VCALENDAR holding one VEVENT with the given UID.
///
/// Modified occurrences become VEVENTs nested in the master event, each with
/// a RECURRENCE-ID and the master's UID; deleted occurrences become EXDATE
/// values. All-day dates are written as seen in `tz`.
pub fn encode_appointment(appointment: &Appointment, uid: &str, tz: Tz) -> String {
    let mut cal = Calendar::empty();
    cal.append_property(Property::new("PRODID", PRODID));
    cal.append_property(Property::new("CALSCALE", "GREGORIAN"));
    cal.append_property(Property::new("VERSION", "2.0"));

    let mut ics_event = encode_details(&appointment.details, tz);
    ics_event.uid(uid);

    for exception in &appointment.exceptions {
        if exception.deleted {
            match exception.exception_start_time {
                Some(ref start) => {
                    ics_event.append_multi_property(Property::new("EXDATE", format_utc(start)));
                }
                None => tracing::debug!("Deleted exception without a start time, skipping"),
            }
            continue;
        }

        let mut child = encode_details(&exception.details, tz);
        child.uid(uid);
        if let Some(ref start) = exception.exception_start_time {
            child.add_property("RECURRENCE-ID", format_utc(start));
        }
        ics_event.append_component(child.done());
    }

    cal.push(ics_event.done());
    let cal = cal.done();

    strip_ics_bloat(&cal.to_string())
}

fn encode_details(details: &EventDetails, tz: Tz) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();

    // DTSTAMP is required in every VEVENT; LAST-MODIFIED only mirrors a known stamp
    let dtstamp = details.dtstamp.unwrap_or_else(Utc::now);
    ics_event.add_property("DTSTAMP", format_utc(&dtstamp));
    if let Some(ref updated) = details.dtstamp {
        ics_event.add_property("LAST-MODIFIED", format_utc(updated));
    }

    if let Some(ref start) = details.start_time {
        ics_event.append_property(time_property("DTSTART", start, details.all_day, tz));
    }
    if let Some(ref subject) = details.subject {
        ics_event.summary(subject);
    }
    if let Some(ref email) = details.organizer_email {
        ics_event.append_property(address_property("ORGANIZER", details.organizer_name.as_deref(), email));
    } else if details.organizer_name.is_some() {
        tracing::debug!("Organizer without an email address, skipping");
    }
    if let Some(ref location) = details.location {
        ics_event.location(location);
    }
    if let Some(ref end) = details.end_time {
        ics_event.append_property(time_property("DTEND", end, details.all_day, tz));
    }
    if let Some(ref recurrence) = details.recurrence {
        let rrule = recurrence.to_rrule();
        if !rrule.is_empty() {
            ics_event.add_property("RRULE", rrule);
        }
    }
    if let Some(sensitivity) = details.sensitivity {
        ics_event.add_property("CLASS", sensitivity.as_ics_str());
    }
    if let Some(busy) = details.busy_status {
        ics_event.add_property("TRANSP", busy.as_ics_str());
    }
    if let Some(status) = details.meeting_status {
        ics_event.add_property("STATUS", status.as_ics_str());
    }

    // ATTENDEE (multi-property - can appear multiple times)
    for attendee in &details.attendees {
        match attendee {
            Attendee { name, email: Some(email) } => {
                ics_event.append_multi_property(address_property("ATTENDEE", name.as_deref(), email));
            }
            Attendee { email: None, .. } => tracing::debug!("Attendee without an email address, skipping"),
        }
    }

    // The builder escapes LF as \n but passes CR through
    if let Some(ref body) = details.body {
        ics_event.description(&body.replace('\r', ""));
    }

    for category in &details.categories {
        ics_event.append_multi_property(Property::new("CATEGORIES", category));
    }

    if let Some(minutes) = details.reminder {
        let trigger = Trigger::before_start(Duration::minutes(i64::from(minutes)));
        ics_event.alarm(Alarm::display("Reminder", trigger));
    }

    ics_event
}

/// Clean up the icalendar crate's output: DTSTAMP and UID inside VALARM
/// are added by the builder but not required there.
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn time_property(name: &str, time: &DateTime<Utc>, all_day: bool, tz: Tz) -> Property {
    if all_day {
        let mut prop = Property::new(name, format_local_date(time, tz));
        prop.append_parameter(ValueType::Date);
        prop
    } else {
        Property::new(name, format_utc(time))
    }
}

/// `NAME;CN=<name>:MAILTO:<email>`
fn address_property(name: &str, display_name: Option<&str>, email: &str) -> Property {
    let mut prop = Property::new(name, format!("MAILTO:{email}"));
    if let Some(cn) = display_name {
        prop.add_parameter("CN", cn);
    }
    prop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::{AppointmentException, BusyStatus, MeetingStatus, Sensitivity};
    use crate::ics::decode_appointment;
    use crate::recurrence::{Frequency, Recurrence, WeekdayMask};
    use chrono::TimeZone;

    fn standup() -> Appointment {
        Appointment {
            timezone: None,
            details: EventDetails {
                dtstamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
                start_time: Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()),
                end_time: Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()),
                subject: Some("Standup; daily, short".to_string()),
                uid: Some("standup-1".to_string()),
                organizer_name: Some("Jane Doe".to_string()),
                organizer_email: Some("jane@example.com".to_string()),
                location: Some("Room 4".to_string()),
                sensitivity: Some(Sensitivity::Private),
                busy_status: Some(BusyStatus::Busy),
                meeting_status: Some(MeetingStatus::Confirmed),
                reminder: Some(15),
                body: Some("Agenda:\r\n1. Status".to_string()),
                categories: vec!["Work".to_string(), "Team".to_string()],
                attendees: vec![
                    Attendee {
                        name: Some("Bob".to_string()),
                        email: Some("bob@example.com".to_string()),
                    },
                    Attendee {
                        name: None,
                        email: Some("carol@example.com".to_string()),
                    },
                ],
                recurrence: Some(Recurrence {
                    frequency: Some(Frequency::Weekly),
                    day_of_week: Some(WeekdayMask::from_bits(42)),
                    ..Default::default()
                }),
                ..Default::default()
            },
            exceptions: vec![],
        }
    }

    /// The VALARM block of `ics`, without its BEGIN/END lines.
    fn alarm_lines(ics: &str) -> Vec<&str> {
        ics.lines()
            .skip_while(|l| *l != "BEGIN:VALARM")
            .skip(1)
            .take_while(|l| *l != "END:VALARM")
            .collect()
    }

    #[test]
    fn test_encode_headers_and_fields() {
        let ics = encode_appointment(&standup(), "standup-1", Tz::UTC);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains(&format!("PRODID:{PRODID}\r\n")));
        assert!(ics.contains("CALSCALE:GREGORIAN\r\n"));
        assert!(ics.contains("VERSION:2.0\r\n"));
        assert!(!ics.contains("ICALENDAR-RS"), "Should not keep the builder's PRODID");
        assert!(ics.contains("UID:standup-1\r\n"));
        assert!(ics.contains("DTSTAMP:20240301T080000Z\r\n"));
        assert!(ics.contains("LAST-MODIFIED:20240301T080000Z\r\n"));
        assert!(ics.contains("DTSTART:20240315T090000Z\r\n"));
        assert!(ics.contains("RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR\r\n"));
        assert!(ics.contains("ORGANIZER;CN=Jane Doe:MAILTO:jane@example.com\r\n"));
        assert!(ics.contains("ATTENDEE;CN=Bob:MAILTO:bob@example.com\r\n"));
        assert!(ics.contains("ATTENDEE:MAILTO:carol@example.com\r\n"));
        assert!(ics.contains("SUMMARY:Standup\\; daily\\, short\r\n"));
        assert!(ics.contains("DESCRIPTION:Agenda:\\n1. Status\r\n"));
        assert!(ics.contains("CATEGORIES:Work\r\nCATEGORIES:Team\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_alarm_has_no_builder_stamps() {
        let ics = encode_appointment(&standup(), "standup-1", Tz::UTC);
        let alarm = alarm_lines(&ics);

        assert!(alarm.contains(&"ACTION:DISPLAY"), "{alarm:?}");
        assert!(alarm.contains(&"DESCRIPTION:Reminder"), "{alarm:?}");
        assert!(alarm.iter().any(|l| l.starts_with("TRIGGER") && l.ends_with(":-PT900S")), "{alarm:?}");
        assert!(
            !alarm.iter().any(|l| l.starts_with("DTSTAMP:") || l.starts_with("UID:")),
            "VALARM should carry no DTSTAMP or UID: {alarm:?}"
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let ics = encode_appointment(&Appointment::default(), "bare", Tz::UTC);

        for name in ["DTSTART", "SUMMARY", "ORGANIZER", "RRULE", "CLASS", "VALARM", "CATEGORIES", "LAST-MODIFIED"] {
            assert!(!ics.contains(name), "{name} should not be emitted: {ics}");
        }
        assert!(ics.contains("UID:bare\r\n"));
        assert_eq!(ics.matches("UID:").count(), 1, "Should emit exactly one UID: {ics}");
        assert!(ics.contains("DTSTAMP:"), "DTSTAMP is always present: {ics}");
    }

    #[test]
    fn test_text_escaping_survives_decode() {
        let appt = Appointment {
            details: EventDetails {
                subject: Some("C:\\new; plan, v2".to_string()),
                location: Some("Room 1, Floor 2".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let ics = encode_appointment(&appt, "escaped", Tz::UTC);
        assert!(ics.contains("SUMMARY:C:\\\\new\\; plan\\, v2\r\n"), "{ics}");

        let decoded = decode_appointment(&ics, 1024, Tz::UTC).expect("Should decode");
        assert_eq!(decoded.details.subject, appt.details.subject);
        assert_eq!(decoded.details.location, appt.details.location);
    }

    #[test]
    fn test_long_lines_are_folded() {
        let appt = Appointment {
            details: EventDetails {
                body: Some("\u{fc}".repeat(100)),
                ..Default::default()
            },
            ..Default::default()
        };

        let ics = encode_appointment(&appt, "long", Tz::UTC);
        for line in ics.split("\r\n") {
            assert!(line.len() <= 75, "Line should be folded: {} octets", line.len());
        }

        let decoded = decode_appointment(&ics, 4096, Tz::UTC).expect("Should decode");
        assert_eq!(decoded.details.body, appt.details.body, "Folding must not lose characters");
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let original = standup();
        let ics = encode_appointment(&original, "standup-1", Tz::UTC);
        let decoded = decode_appointment(&ics, 4096, Tz::UTC).expect("Should decode");

        assert_eq!(decoded.details, original.details);
        assert!(decoded.exceptions.is_empty());
    }

    #[test]
    fn test_all_day_dates_use_ambient_zone() {
        let tz = Tz::Europe__Berlin;
        let appt = Appointment {
            details: EventDetails {
                // Midnight in Berlin is 22:00 UTC the day before in summer
                start_time: Some(Utc.with_ymd_and_hms(2024, 7, 3, 22, 0, 0).unwrap()),
                end_time: Some(Utc.with_ymd_and_hms(2024, 7, 4, 22, 0, 0).unwrap()),
                all_day: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let ics = encode_appointment(&appt, "holiday", tz);
        assert!(ics.contains("DTSTART;VALUE=DATE:20240704\r\n"), "{ics}");
        assert!(ics.contains("DTEND;VALUE=DATE:20240705\r\n"), "{ics}");

        let decoded = decode_appointment(&ics, 1024, tz).expect("Should decode");
        assert!(decoded.details.all_day);
        assert_eq!(decoded.details.start_time, appt.details.start_time);
        assert_eq!(decoded.details.end_time, appt.details.end_time);
    }

    #[test]
    fn test_exceptions_round_trip() {
        let mut appt = standup();
        let moved_from = Utc.with_ymd_and_hms(2024, 3, 18, 9, 0, 0).unwrap();
        let deleted_from = Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap();
        appt.exceptions = vec![
            AppointmentException {
                exception_start_time: Some(moved_from),
                deleted: false,
                details: EventDetails {
                    start_time: Some(Utc.with_ymd_and_hms(2024, 3, 18, 10, 0, 0).unwrap()),
                    subject: Some("Late standup".to_string()),
                    uid: Some("standup-1".to_string()),
                    busy_status: Some(BusyStatus::Busy),
                    ..Default::default()
                },
            },
            AppointmentException {
                exception_start_time: Some(deleted_from),
                deleted: true,
                details: EventDetails::default(),
            },
        ];

        let ics = encode_appointment(&appt, "standup-1", Tz::UTC);
        assert!(ics.contains("RECURRENCE-ID:20240318T090000Z\r\n"), "{ics}");
        assert!(ics.contains("EXDATE:20240320T090000Z\r\n"), "{ics}");
        assert_eq!(ics.matches("UID:standup-1\r\n").count(), 2, "Exception should share the master UID: {ics}");

        let decoded = decode_appointment(&ics, 4096, Tz::UTC).expect("Should decode");
        assert_eq!(decoded.exceptions.len(), 2);

        let deleted = decoded.exceptions.iter().find(|e| e.deleted).expect("Should have deleted occurrence");
        assert_eq!(deleted.exception_start_time, Some(deleted_from));

        let moved = decoded.exceptions.iter().find(|e| !e.deleted).expect("Should have moved occurrence");
        assert_eq!(moved.exception_start_time, Some(moved_from));
        assert_eq!(moved.details, appt.exceptions[0].details);
    }

    #[test]
    fn test_recurrence_round_trip_is_set_equal() {
        let ics = encode_appointment(&standup(), "standup-1", Tz::UTC);
        let decoded = decode_appointment(&ics, 4096, Tz::UTC).expect("Should decode");
        let rrule = decoded.details.recurrence.expect("Should have recurrence").to_rrule();

        let mut clauses: Vec<&str> = rrule.split(';').collect();
        clauses.sort_unstable();
        assert_eq!(clauses, vec!["BYDAY=MO,WE,FR", "FREQ=WEEKLY"]);
    }
}
