//! RRULE <-> structured recurrence conversion.
//!
//! The sync protocol describes recurrence with a handful of typed fields and a
//! day-of-week bitmask instead of RRULE text. Only the clauses that map onto
//! those fields are understood; everything else is logged and dropped.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::datetime::{format_utc, make_utc_date};

/// Recurrence frequency (RRULE FREQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Sync protocol recurrence type code.
    pub fn code(self) -> u8 {
        match self {
            Frequency::Daily => 0,
            Frequency::Weekly => 1,
            Frequency::Monthly => 2,
            Frequency::Yearly => 5,
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    pub fn as_ics_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

/// Weekday codes in bit order: bit 0 is Sunday, bit 6 is Saturday.
const WEEKDAY_CODES: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// Set of weekdays as the sync protocol's additive bitmask
/// (SU=1, MO=2, TU=4, WE=8, TH=16, FR=32, SA=64).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdayMask(u8);

impl WeekdayMask {
    /// Build a mask from raw bits, dropping anything above Saturday.
    pub fn from_bits(bits: u8) -> Self {
        WeekdayMask(bits & 0x7f)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Mask for a single two-letter weekday code.
    pub fn from_code(code: &str) -> Option<Self> {
        WEEKDAY_CODES
            .iter()
            .position(|c| *c == code)
            .map(|bit| WeekdayMask(1 << bit))
    }

    pub fn insert(&mut self, other: WeekdayMask) {
        self.0 |= other.0;
    }

    /// Weekday codes present in the mask, Sunday first.
    pub fn codes(self) -> Vec<&'static str> {
        WEEKDAY_CODES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, code)| *code)
            .collect()
    }
}

/// Structured recurrence as carried by the sync protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: Option<Frequency>,
    pub until: Option<DateTime<Utc>>,
    /// Number of occurrences (COUNT)
    pub occurrences: Option<u32>,
    pub interval: Option<u32>,
    pub day_of_week: Option<WeekdayMask>,
    pub day_of_month: Option<u8>,
    pub month_of_year: Option<u8>,
}

impl Recurrence {
    /// Parse an RRULE value such as `FREQ=WEEKLY;BYDAY=MO,WE,FR`.
    ///
    /// Never fails: unknown clauses and unparseable values are logged and
    /// skipped. Floating UNTIL values are read in `tz`.
    pub fn parse(rrule: &str, tz: Tz) -> Self {
        let mut recurrence = Recurrence::default();

        for clause in rrule.split(';').filter(|c| !c.is_empty()) {
            let Some((key, value)) = clause.split_once('=') else {
                tracing::debug!(clause, "RRULE clause without value, skipping");
                continue;
            };

            match key.trim() {
                "FREQ" => recurrence.frequency = Frequency::from_ics_str(value),
                "UNTIL" => {
                    recurrence.until = make_utc_date(value, tz);
                    if recurrence.until.is_none() {
                        tracing::warn!(value, "Unparseable RRULE UNTIL");
                    }
                }
                "COUNT" => recurrence.occurrences = parse_number(key, value),
                "INTERVAL" => recurrence.interval = parse_number(key, value),
                "BYDAY" => {
                    let mut mask = WeekdayMask::default();
                    for day in value.split(',') {
                        match WeekdayMask::from_code(day.trim()) {
                            Some(bit) => mask.insert(bit),
                            None => tracing::debug!(day, "BYDAY entry is not supported"),
                        }
                    }
                    recurrence.day_of_week = (!mask.is_empty()).then_some(mask);
                }
                // Only the first BYMONTHDAY is kept: BYMONTHDAY=2,3 becomes 2
                "BYMONTHDAY" => {
                    let first = value.split(',').next().unwrap_or_default();
                    recurrence.day_of_month = parse_number(key, first);
                }
                "BYMONTH" => recurrence.month_of_year = parse_number(key, value),
                other => tracing::debug!(clause = other, "RRULE clause is not supported"),
            }
        }

        recurrence
    }

    /// Render the RRULE value. Clauses whose field is unset are omitted.
    pub fn to_rrule(&self) -> String {
        let mut clauses = Vec::new();

        if let Some(freq) = self.frequency {
            clauses.push(format!("FREQ={}", freq.as_ics_str()));
        }
        if let Some(ref until) = self.until {
            clauses.push(format!("UNTIL={}", format_utc(until)));
        }
        if let Some(count) = self.occurrences {
            clauses.push(format!("COUNT={count}"));
        }
        if let Some(interval) = self.interval {
            clauses.push(format!("INTERVAL={interval}"));
        }
        if let Some(mask) = self.day_of_week.filter(|m| !m.is_empty()) {
            clauses.push(format!("BYDAY={}", mask.codes().join(",")));
        }
        if let Some(day) = self.day_of_month {
            clauses.push(format!("BYMONTHDAY={day}"));
        }
        if let Some(month) = self.month_of_year {
            clauses.push(format!("BYMONTH={month}"));
        }

        clauses.join(";")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value, "Unparseable RRULE number");
    }
    parsed
}
