//! Sync-side appointment types.
//!
//! These types mirror the mobile sync protocol's appointment record. The
//! iCalendar decoder fills them in and the encoder reads them back out, so
//! nothing outside `ics` needs to know about calendar text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recurrence::Recurrence;

/// A calendar appointment as exchanged with sync clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Base64-encoded timezone record (see [`crate::timezone::TimezoneDescriptor`])
    pub timezone: Option<String>,
    #[serde(flatten)]
    pub details: EventDetails,
    /// Modified or deleted occurrences of a recurring appointment
    #[serde(default)]
    pub exceptions: Vec<AppointmentException>,
}

/// One overridden occurrence of a recurring appointment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentException {
    /// Start of the original occurrence this exception replaces (RECURRENCE-ID)
    pub exception_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(flatten)]
    pub details: EventDetails,
}

/// Fields shared by an appointment and its exceptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub dtstamp: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    pub subject: Option<String>,
    pub uid: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_email: Option<String>,
    pub location: Option<String>,
    pub sensitivity: Option<Sensitivity>,
    pub busy_status: Option<BusyStatus>,
    pub meeting_status: Option<MeetingStatus>,
    /// Minutes before the start at which to remind
    pub reminder: Option<u32>,
    pub body: Option<String>,
    #[serde(default)]
    pub body_truncated: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    pub recurrence: Option<Recurrence>,
}

/// A meeting attendee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Appointment sensitivity (iCalendar CLASS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Normal,
    Private,
    Confidential,
}

impl Sensitivity {
    /// Sync protocol code.
    pub fn code(self) -> u8 {
        match self {
            Sensitivity::Normal => 0,
            Sensitivity::Private => 2,
            Sensitivity::Confidential => 3,
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s {
            "PUBLIC" => Some(Sensitivity::Normal),
            "PRIVATE" => Some(Sensitivity::Private),
            "CONFIDENTIAL" => Some(Sensitivity::Confidential),
            _ => None,
        }
    }

    pub fn as_ics_str(self) -> &'static str {
        match self {
            Sensitivity::Normal => "PUBLIC",
            Sensitivity::Private => "PRIVATE",
            Sensitivity::Confidential => "CONFIDENTIAL",
        }
    }
}

/// Whether the appointment blocks time (iCalendar TRANSP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyStatus {
    Free,
    Busy,
}

impl BusyStatus {
    /// Sync protocol code.
    pub fn code(self) -> u8 {
        match self {
            BusyStatus::Free => 0,
            BusyStatus::Busy => 2,
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s {
            "TRANSPARENT" => Some(BusyStatus::Free),
            "OPAQUE" => Some(BusyStatus::Busy),
            _ => None,
        }
    }

    pub fn as_ics_str(self) -> &'static str {
        match self {
            BusyStatus::Free => "TRANSPARENT",
            BusyStatus::Busy => "OPAQUE",
        }
    }
}

/// Meeting state (iCalendar STATUS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Tentative,
    Confirmed,
    Cancelled,
}

impl MeetingStatus {
    /// Sync protocol code.
    pub fn code(self) -> u8 {
        match self {
            MeetingStatus::Tentative => 1,
            MeetingStatus::Confirmed => 3,
            MeetingStatus::Cancelled => 5,
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s {
            "TENTATIVE" => Some(MeetingStatus::Tentative),
            "CONFIRMED" => Some(MeetingStatus::Confirmed),
            "CANCELLED" => Some(MeetingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_ics_str(self) -> &'static str {
        match self {
            MeetingStatus::Tentative => "TENTATIVE",
            MeetingStatus::Confirmed => "CONFIRMED",
            MeetingStatus::Cancelled => "CANCELLED",
        }
    }
}
