//! Error types for the CalDAV backend.

use calbridge_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Operations the CalDAV backend never attempts
    #[error("{0} is not supported by the CalDAV backend")]
    Unsupported(&'static str),

    #[error("Invalid folder id: {0}")]
    InvalidFolderId(String),

    #[error("Item not found: {0}")]
    ItemNotCached(String),

    #[error("Not logged on")]
    NotLoggedOn,

    #[error("Precondition failed for {0}")]
    PreconditionFailed(String),

    #[error("{method} {url} returned status {status}")]
    Status {
        method: http::Method,
        url: String,
        status: u16,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid HTTP method: {0}")]
    Method(#[from] http::method::InvalidMethod),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
