//! Provider configuration.
//!
//! Read from:
//!   ~/.config/calbridge/providers/caldav/config.toml
//!
//! ```toml
//! server_url = "https://dav.example.com"
//! calendar_path = "/calendars/%u/"
//! default_timezone = "Europe/Berlin"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use calbridge_core::datetime::resolve_timezone;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::backend::BackendSettings;

pub const PROVIDER_NAME: &str = "caldav";

pub fn base_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join("calbridge")
        .join("providers")
        .join(PROVIDER_NAME))
}

fn default_calendar_path() -> String {
    "/calendars/%u/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheme and host of the CalDAV server
    pub server_url: String,
    /// Calendar home path; `%u` is replaced by the user name at logon
    #[serde(default = "default_calendar_path")]
    pub calendar_path: String,
    /// IANA zone for floating and all-day times (UTC when unset)
    #[serde(default)]
    pub default_timezone: Option<String>,
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::path()?;

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read CalDAV config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse CalDAV config from {}", path.display()))
    }

    /// Configured default timezone. Unknown names fall back to UTC.
    pub fn timezone(&self) -> Tz {
        match self.default_timezone.as_deref() {
            Some(name) => resolve_timezone(name).unwrap_or_else(|| {
                tracing::warn!(timezone = name, "Unknown default timezone, using UTC");
                Tz::UTC
            }),
            None => Tz::UTC,
        }
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            calendar_path: self.calendar_path.clone(),
            default_timezone: self.timezone(),
        }
    }
}
