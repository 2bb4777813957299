//! The remote calendar store the backend talks to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BridgeResult;

/// Server path of a collection or resource, e.g. `/calendars/jane/work/event.ics`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Href(String);

impl Href {
    pub fn new(href: impl Into<String>) -> Self {
        Href(href.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Child resource `name` of this collection.
    pub fn join(&self, name: &str) -> Href {
        Href(format!("{}/{}", self.0.trim_end_matches('/'), name))
    }

    /// Child collection `name`, with the trailing slash collections carry.
    pub fn join_collection(&self, name: &str) -> Href {
        Href(format!("{}/{}/", self.0.trim_end_matches('/'), name.trim_matches('/')))
    }

    /// Last non-empty path segment.
    pub fn last_segment(&self) -> &str {
        self.0.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
    }

    /// The UID a resource is named after: its last segment without `.ics`.
    pub fn resource_uid(&self) -> &str {
        let segment = self.last_segment();
        segment.strip_suffix(".ics").unwrap_or(segment)
    }

    pub fn is_path(id: &str) -> bool {
        id.contains('/')
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque entity tag of a resource version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    pub fn new(etag: impl Into<String>) -> Self {
        ETag(etag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A calendar resource as fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub href: Href,
    pub etag: Option<ETag>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCollection {
    pub href: Href,
    pub display_name: Option<String>,
}

/// Component type a collection query filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Event,
    Todo,
}

impl ComponentKind {
    pub fn as_ics_str(self) -> &'static str {
        match self {
            ComponentKind::Event => "VEVENT",
            ComponentKind::Todo => "VTODO",
        }
    }
}

/// Conditional-write requirement for a PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// `If-None-Match: *`
    CreateOnly,
    /// `If-Match: <etag>`
    IfMatch(ETag),
    Unconditional,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Operations the backend needs from a CalDAV server.
///
/// Calls are blocking and issued one at a time.
pub trait RemoteStore {
    /// Bind the store to a user's calendar home.
    fn login(&mut self, home: Href, credentials: Credentials);

    /// Methods the server allows on the calendar home (OPTIONS `Allow`).
    fn options(&self) -> BridgeResult<Vec<String>>;

    /// Calendar collections below the calendar home.
    fn list_collections(&self) -> BridgeResult<Vec<CalendarCollection>>;

    fn collection_details(&self, collection: &Href) -> BridgeResult<CalendarCollection>;

    /// Resources of `kind` overlapping `[start, end]`.
    fn fetch_range(
        &self,
        collection: &Href,
        kind: ComponentKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BridgeResult<Vec<RemoteItem>>;

    fn fetch_by_uid(
        &self,
        collection: &Href,
        kind: ComponentKind,
        uid: &str,
    ) -> BridgeResult<Option<RemoteItem>>;

    /// Store `data` at `href`, returning the new entity tag if the server
    /// sent one. A failed precondition is
    /// [`BridgeError::PreconditionFailed`](crate::error::BridgeError::PreconditionFailed).
    fn put(&mut self, href: &Href, data: &str, precondition: &Precondition) -> BridgeResult<Option<ETag>>;

    /// Delete `href`, returning the HTTP status code.
    fn delete(&mut self, href: &Href) -> BridgeResult<u16>;
}
