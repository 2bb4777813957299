//! Core types for calbridge.
//!
//! This crate holds everything that does not talk to a server:
//! - `appointment` and `recurrence`: the sync-side appointment model
//! - `ics`: iCalendar parsing and generation for that model
//! - `timezone`: the binary timezone record sync clients expect
//! - `protocol`: the provider's JSON-lines request/response types

pub mod appointment;
pub mod datetime;
pub mod error;
pub mod ics;
pub mod protocol;
pub mod recurrence;
pub mod timezone;

pub use appointment::*;
pub use error::{CoreError, CoreResult};
pub use recurrence::{Frequency, Recurrence, WeekdayMask};
pub use timezone::{TimezoneDescriptor, TransitionDate};
