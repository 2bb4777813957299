//! CalDAV backend for mobile sync clients.
//!
//! [`CalDavBackend`] answers the sync protocol's folder and item operations
//! from a CalDAV calendar home, converting items with `calbridge-core`.

pub mod backend;
pub mod caldav;
pub mod config;
pub mod error;
pub mod folder;
pub mod store;

pub use backend::{BackendSettings, CalDavBackend, ItemStat, far_future};
pub use caldav::CalDavClient;
pub use config::Config;
pub use error::{BridgeError, BridgeResult};
pub use folder::{FolderId, FolderKind, FolderStat, SyncFolder};
pub use store::{CalendarCollection, ComponentKind, ETag, Href, Precondition, RemoteItem, RemoteStore};
