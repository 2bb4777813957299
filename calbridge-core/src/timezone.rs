//! Binary timezone records for the sync protocol.
//!
//! Sync clients describe a timezone with a fixed 172-byte record: a standard
//! and a daylight phase, each with a bias, a display name and a "nth weekday
//! of month" transition rule. The record is computed from the IANA database
//! by locating the next two real transitions after a reference instant.
//!
//! Layout (little endian):
//!
//! | field          | type       |
//! |----------------|------------|
//! | bias           | `i32`      |
//! | standard name  | `[u8; 64]` |
//! | standard date  | 8 × `u16`  |
//! | standard bias  | `i32`      |
//! | daylight name  | `[u8; 64]` |
//! | daylight date  | 8 × `u16`  |
//! | daylight bias  | `i32`      |

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::{OffsetComponents, Tz};

use crate::datetime::resolve_timezone;
use crate::error::{CoreError, CoreResult};

/// Size of a packed [`TimezoneDescriptor`].
pub const RECORD_SIZE: usize = 172;

const NAME_SIZE: usize = 64;

/// How far ahead to look for DST transitions.
const SEARCH_HORIZON_DAYS: i64 = 800;

/// Transition rule of one phase, laid out like a Windows SYSTEMTIME.
///
/// `year` is zero for recurring rules. `week` is the occurrence of
/// `day_of_week` in the month (1-4, 5 meaning the last one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionDate {
    pub year: u16,
    pub month: u16,
    /// 0 = Sunday
    pub day_of_week: u16,
    pub week: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub millisecond: u16,
}

/// Timezone description understood by sync clients.
///
/// Biases are in minutes and sign-inverted relative to the UTC offset, so a
/// zone at UTC+1 has a bias of -60. `daylight_bias` is relative to `bias`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimezoneDescriptor {
    pub bias: i32,
    pub standard_name: String,
    pub standard_date: TransitionDate,
    pub standard_bias: i32,
    pub daylight_name: String,
    pub daylight_date: TransitionDate,
    pub daylight_bias: i32,
}

/// UTC offset and DST flag in effect at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OffsetState {
    offset_seconds: i32,
    is_dst: bool,
}

#[derive(Debug)]
struct Transition {
    /// First instant of the new state
    at: DateTime<Utc>,
    before: OffsetState,
    after: OffsetState,
    abbreviation: String,
}

impl TimezoneDescriptor {
    /// The all-zero record used for UTC and for zones that cannot be resolved.
    pub fn utc() -> Self {
        Self::default()
    }

    /// Describe the IANA zone `name` using the transitions following `now`.
    ///
    /// Never fails: UTC, unknown names and zones without DST all yield
    /// [`TimezoneDescriptor::utc`].
    pub fn for_zone(name: &str, now: DateTime<Utc>, with_names: bool) -> Self {
        if name == "UTC" {
            return Self::utc();
        }

        let Some(tz) = resolve_timezone(name) else {
            tracing::warn!(timezone = name, "Unknown timezone, using UTC");
            return Self::utc();
        };

        match Self::from_transitions(tz, now, with_names) {
            Some(descriptor) => descriptor,
            None => {
                tracing::debug!(timezone = name, "No DST transitions found, using UTC");
                Self::utc()
            }
        }
    }

    fn from_transitions(tz: Tz, now: DateTime<Utc>, with_names: bool) -> Option<Self> {
        let transitions = next_transitions(tz, now, 2);
        let [first, second] = transitions.as_slice() else {
            return None;
        };

        let (dst, std) = match (first.after.is_dst, second.after.is_dst) {
            (true, false) => (first, second),
            (false, true) => (second, first),
            _ => return None,
        };

        let bias = -(std.after.offset_seconds / 60);
        let daylight_bias = -((dst.after.offset_seconds - std.after.offset_seconds) / 60);

        let (standard_name, daylight_name) = if with_names {
            (std.abbreviation.clone(), dst.abbreviation.clone())
        } else {
            (String::new(), String::new())
        };

        Some(TimezoneDescriptor {
            bias,
            standard_name,
            standard_date: transition_date(std),
            standard_bias: 0,
            daylight_name,
            daylight_date: transition_date(dst),
            daylight_bias,
        })
    }

    /// Pack into the fixed binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_SIZE);
        buf.extend_from_slice(&self.bias.to_le_bytes());
        write_name(&mut buf, &self.standard_name);
        write_date(&mut buf, &self.standard_date);
        buf.extend_from_slice(&self.standard_bias.to_le_bytes());
        write_name(&mut buf, &self.daylight_name);
        write_date(&mut buf, &self.daylight_date);
        buf.extend_from_slice(&self.daylight_bias.to_le_bytes());
        buf
    }

    /// Unpack from the fixed binary layout.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(CoreError::TimezoneRecord(format!(
                "expected {RECORD_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let mut reader = Reader { buf: bytes, pos: 0 };
        Ok(TimezoneDescriptor {
            bias: reader.i32()?,
            standard_name: reader.name()?,
            standard_date: reader.date()?,
            standard_bias: reader.i32()?,
            daylight_name: reader.name()?,
            daylight_date: reader.date()?,
            daylight_bias: reader.i32()?,
        })
    }

    /// Pack and base64-encode, as embedded in an appointment.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn decode(text: &str) -> CoreResult<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CoreError::TimezoneRecord(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Encoded timezone record for `name`, computed against the current time.
pub fn timezone_string(name: &str, with_names: bool) -> String {
    TimezoneDescriptor::for_zone(name, Utc::now(), with_names).encode()
}

fn offset_state(tz: Tz, at: DateTime<Utc>) -> OffsetState {
    let offset = tz.offset_from_utc_datetime(&at.naive_utc());
    OffsetState {
        offset_seconds: offset.fix().local_minus_utc(),
        is_dst: offset.dst_offset() != Duration::zero(),
    }
}

/// Find up to `limit` offset changes after `from`, walking a day at a time
/// and bisecting each change down to the second.
fn next_transitions(tz: Tz, from: DateTime<Utc>, limit: usize) -> Vec<Transition> {
    let mut transitions = Vec::new();
    let mut cursor = from;
    let mut current = offset_state(tz, cursor);

    for _ in 0..SEARCH_HORIZON_DAYS {
        let next = cursor + Duration::days(1);
        let state = offset_state(tz, next);

        if state != current {
            let at = bisect(tz, cursor, next, current);
            transitions.push(Transition {
                at,
                before: current,
                after: state,
                abbreviation: at.with_timezone(&tz).format("%Z").to_string(),
            });
            if transitions.len() == limit {
                break;
            }
            current = state;
        }

        cursor = next;
    }

    transitions
}

/// `lo` is in state `before`, `hi` is not. Returns the first second of the
/// new state.
fn bisect(tz: Tz, mut lo: DateTime<Utc>, mut hi: DateTime<Utc>, before: OffsetState) -> DateTime<Utc> {
    while hi - lo > Duration::seconds(1) {
        let mid = lo + (hi - lo) / 2;
        if offset_state(tz, mid) == before {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

/// Express a transition as a recurring rule, using the wall-clock time in
/// effect just before it.
fn transition_date(transition: &Transition) -> TransitionDate {
    let local: NaiveDateTime =
        transition.at.naive_utc() + Duration::seconds(i64::from(transition.before.offset_seconds));

    let day = local.day();
    let mut week = (day - 1) / 7 + 1;
    if (local.date() + Duration::days(7)).month() != local.month() {
        week = 5;
    }

    TransitionDate {
        year: 0,
        month: local.month() as u16,
        day_of_week: local.weekday().num_days_from_sunday() as u16,
        week: week as u16,
        hour: local.hour() as u16,
        minute: local.minute() as u16,
        second: 0,
        millisecond: 0,
    }
}

fn write_name(buf: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; NAME_SIZE];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_SIZE);
    field[..len].copy_from_slice(&bytes[..len]);
    buf.extend_from_slice(&field);
}

fn write_date(buf: &mut Vec<u8>, date: &TransitionDate) {
    for value in [
        date.year,
        date.month,
        date.day_of_week,
        date.week,
        date.hour,
        date.minute,
        date.second,
        date.millisecond,
    ] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let slice = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or_else(|| CoreError::TimezoneRecord("record is truncated".into()))?;
        self.pos += len;
        Ok(slice)
    }

    fn i32(&mut self) -> CoreResult<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(raw))
    }

    fn u16(&mut self) -> CoreResult<u16> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(raw))
    }

    fn name(&mut self) -> CoreResult<String> {
        let raw = self.take(NAME_SIZE)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(NAME_SIZE);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    fn date(&mut self) -> CoreResult<TransitionDate> {
        Ok(TransitionDate {
            year: self.u16()?,
            month: self.u16()?,
            day_of_week: self.u16()?,
            week: self.u16()?,
            hour: self.u16()?,
            minute: self.u16()?,
            second: self.u16()?,
            millisecond: self.u16()?,
        })
    }
}
