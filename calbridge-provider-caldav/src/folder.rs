//! Sync folder ids.
//!
//! Every calendar collection shows up twice on the sync side: once as an
//! appointment folder (`C<name>`) and once as a task folder (`T<name>`),
//! where `<name>` is the collection's last path segment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::store::{ComponentKind, Href};

/// Parent id of every folder; they all sit at the root.
pub const ROOT_FOLDER_ID: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderKind {
    Appointments,
    Tasks,
}

impl FolderKind {
    pub fn tag(self) -> char {
        match self {
            FolderKind::Appointments => 'C',
            FolderKind::Tasks => 'T',
        }
    }

    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'C' => Some(FolderKind::Appointments),
            'T' => Some(FolderKind::Tasks),
            _ => None,
        }
    }

    /// Sync protocol folder type.
    pub fn code(self) -> u8 {
        match self {
            FolderKind::Appointments => 8,
            FolderKind::Tasks => 7,
        }
    }

    pub fn component(self) -> ComponentKind {
        match self {
            FolderKind::Appointments => ComponentKind::Event,
            FolderKind::Tasks => ComponentKind::Todo,
        }
    }
}

/// A parsed folder id: kind tag plus collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderId {
    pub kind: FolderKind,
    pub collection: String,
}

impl FolderId {
    pub fn for_collection(kind: FolderKind, collection: &Href) -> Self {
        FolderId {
            kind,
            collection: collection.last_segment().to_string(),
        }
    }
}

impl FromStr for FolderId {
    type Err = BridgeError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let mut chars = id.chars();
        let kind = chars
            .next()
            .and_then(FolderKind::from_tag)
            .ok_or_else(|| BridgeError::InvalidFolderId(id.to_string()))?;

        let collection = chars.as_str();
        if collection.is_empty() {
            return Err(BridgeError::InvalidFolderId(id.to_string()));
        }

        Ok(FolderId {
            kind,
            collection: collection.to_string(),
        })
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.tag(), self.collection)
    }
}

/// Folder record returned by `get_folder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFolder {
    pub server_id: String,
    pub parent_id: String,
    pub display_name: String,
    pub folder_type: FolderKind,
}

/// Folder change-detection record. `modification` only changes when the id does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStat {
    pub id: String,
    pub parent: String,
    pub modification: String,
}

impl FolderStat {
    pub fn for_folder(id: &FolderId) -> Self {
        FolderStat {
            id: id.to_string(),
            parent: ROOT_FOLDER_ID.to_string(),
            modification: id.to_string(),
        }
    }
}
