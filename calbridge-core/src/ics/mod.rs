//! iCalendar parsing and generation.
//!
//! Calendar text is read into an owned component tree and mapped onto
//! [`Appointment`](crate::appointment::Appointment) records. Encoding goes
//! through the icalendar builder.

mod component;
mod generate;
mod parse;

pub use component::{CalendarComponent, CalendarProperty, parse_calendar};
pub use generate::{PRODID, encode_appointment};
pub use parse::decode_appointment;
