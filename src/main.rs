mod backup;
mod config;
mod db;
mod error;
mod ipc;
mod media;
mod model;
mod store;
mod subscriptions;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn write_line(stdout: &mut impl Write, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
}

fn main() {
    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = match config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "invalid configuration");
            std::process::exit(2);
        }
    };
    let initial_workspace: Option<PathBuf> = config.workspace.clone();
    let mut state = ipc::AppState::new(config);

    if let Some(path) = initial_workspace {
        if let Err(e) = state.open_workspace(&path) {
            warn!(error = %format!("{e:#}"), "could not open PORTAL_WORKSPACE");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "portald ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                write_line(&mut stdout, &resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
        for event in state.hub.drain() {
            write_line(&mut stdout, &event);
        }
        let _ = stdout.flush();
    }
    info!("stdin closed, shutting down");
}
