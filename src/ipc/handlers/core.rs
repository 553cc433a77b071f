use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "mediaBackend": state.media.as_ref().map(|m| m.backend()),
            "admin": state.admin,
            "subscriptions": state.hub.open_count(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "mediaBackend": state.media.as_ref().map(|m| m.backend()),
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

// Digests have a fixed length, so the comparison does not short-circuit on
// the first differing byte of the secret.
fn same_secret(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    da.iter().zip(db.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn handle_admin_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let username = match required_str(&req.params, "username") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    let password = match required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    let Some(expected) = state.config.admin_password.as_deref() else {
        return err(&req.id, "forbidden", "admin login is disabled", None);
    };
    let valid = same_secret(&username, &state.config.admin_username) & same_secret(&password, expected);
    if !valid {
        warn!("rejected admin login");
        return err(&req.id, "forbidden", "invalid admin credentials", None);
    }
    state.admin = true;
    info!("admin logged in");
    ok(&req.id, json!({ "admin": true }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.admin = false;
    ok(&req.id, json!({ "admin": false }))
}

fn handle_auth_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "admin": state.admin }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "auth.adminLogin" => Some(handle_admin_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.status" => Some(handle_auth_status(state, req)),
        _ => None,
    }
}
