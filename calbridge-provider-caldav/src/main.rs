//! calbridge-provider-caldav - CalDAV backend for mobile sync clients
//!
//! This binary speaks the calbridge provider protocol: one JSON request per
//! line on stdin, one JSON response per line on stdout. Logs go to stderr
//! (set `RUST_LOG` for more detail).
//!
//! Server settings are read from:
//!   ~/.config/calbridge/providers/caldav/config.toml

use std::io::{self, BufRead, Write};

use anyhow::Result;
use calbridge_core::protocol::{
    Command, FolderParams, GetItemParams, ItemParams, ListItemsParams, LogonParams, Request,
    Response, WriteItemParams,
};
use calbridge_provider_caldav::{CalDavBackend, CalDavClient, Config};
use chrono::DateTime;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

type Backend = CalDavBackend<CalDavClient>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    let config = Config::load()?;
    let client = CalDavClient::new(&config.server_url)?;
    let mut backend = CalDavBackend::new(client, config.backend_settings());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&mut backend, request),
            Err(e) => Response::error(&format!("Failed to parse request: {}", e)),
        };

        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }

    Ok(())
}

/// `RUST_LOG` when it parses, warnings otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn handle_request(backend: &mut Backend, request: Request) -> String {
    let params = request.params;
    match request.command {
        Command::Logon => with_params(params, |p: LogonParams| {
            Response::success(backend.logon(&p.username, &p.password))
        }),
        Command::Logoff => Response::success(backend.logoff()),
        Command::ListFolders => respond(backend.list_folders()),
        Command::GetFolder => with_params(params, |p: FolderParams| {
            respond(backend.get_folder(&p.folder_id))
        }),
        Command::StatFolder => with_params(params, |p: FolderParams| {
            respond(backend.stat_folder(&p.folder_id))
        }),
        Command::ListItems => with_params(params, |p: ListItemsParams| {
            match DateTime::from_timestamp(p.since, 0) {
                Some(since) => respond(backend.list_items(&p.folder_id, since)),
                None => Response::error(&format!(
                    "Invalid params: since out of range: {}",
                    p.since
                )),
            }
        }),
        Command::StatItem => with_params(params, |p: ItemParams| {
            respond(backend.stat_item(&p.folder_id, &p.id))
        }),
        Command::GetItem => with_params(params, |p: GetItemParams| {
            respond(backend.get_item(&p.folder_id, &p.id, p.truncation))
        }),
        Command::WriteItem => with_params(params, |p: WriteItemParams| {
            respond(backend.write_item(&p.folder_id, p.id.as_deref(), &p.appointment))
        }),
        Command::DeleteItem => with_params(params, |p: ItemParams| {
            respond(backend.delete_item(&p.folder_id, &p.id))
        }),
    }
}

fn with_params<P: DeserializeOwned>(
    params: serde_json::Value,
    handle: impl FnOnce(P) -> String,
) -> String {
    match serde_json::from_value(params) {
        Ok(p) => handle(p),
        Err(e) => Response::error(&format!("Invalid params: {}", e)),
    }
}

fn respond<T: serde::Serialize>(result: calbridge_provider_caldav::BridgeResult<T>) -> String {
    match result {
        Ok(data) => Response::success(data),
        Err(e) => Response::error(&format!("{:#}", e)),
    }
}
