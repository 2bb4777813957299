//! Provider protocol types.
//!
//! Defines the JSON protocol spoken between a sync engine and provider
//! binaries over stdin/stdout: one request per line, one response per line.

use serde::{Deserialize, Serialize};

use crate::appointment::Appointment;

/// Commands that providers must implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Logon,
    Logoff,
    ListFolders,
    GetFolder,
    StatFolder,
    ListItems,
    StatItem,
    GetItem,
    WriteItem,
    DeleteItem,
}

/// Request sent from the sync engine to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider to the sync engine.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> String {
        serde_json::to_string(&Response::Success { data })
            .unwrap_or_else(|e| Response::error(&format!("Failed to serialize response: {e}")))
    }
}

impl Response<()> {
    pub fn error(msg: &str) -> String {
        serde_json::json!({ "status": "error", "error": msg }).to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogonParams {
    pub username: String,
    pub password: String,
}

/// Parameters for commands that address a single folder.
#[derive(Debug, Serialize, Deserialize)]
pub struct FolderParams {
    pub folder_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListItemsParams {
    pub folder_id: String,
    /// Lower bound of the sync window, in Unix epoch seconds.
    #[serde(default)]
    pub since: i64,
}

/// Parameters for commands that address a single item in a folder.
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemParams {
    pub folder_id: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetItemParams {
    pub folder_id: String,
    pub id: String,
    /// Maximum body size in bytes.
    pub truncation: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteItemParams {
    pub folder_id: String,
    /// Existing item id, or `None` to create a new item.
    #[serde(default)]
    pub id: Option<String>,
    pub appointment: Appointment,
}
