//! Error types for calbridge-core.

use thiserror::Error;

/// Errors that can occur while converting calendar data.
///
/// Decoding is best-effort: most malformed input is logged and skipped rather
/// than reported here. These variants cover input that cannot be read at all.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("No calendar component found in ICS data")]
    EmptyCalendar,

    #[error("Timezone record error: {0}")]
    TimezoneRecord(String),
}

/// Result type alias for calbridge-core operations.
pub type CoreResult<T> = Result<T, CoreError>;
