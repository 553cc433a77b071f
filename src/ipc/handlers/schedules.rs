use crate::error::{PortalError, Result};
use crate::ipc::error::fail;
use crate::ipc::helpers::{no_workspace, optional_str, parse_params, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::StudySession;
use crate::store::schedules::{self, CopyMode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveParams {
    #[serde(default)]
    sessions: Vec<StudySession>,
}

fn friend_params(params: &serde_json::Value) -> Result<(String, String)> {
    Ok((
        required_str(params, "userId")?,
        required_str(params, "friendUserId")?,
    ))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        required_str(&req.params, "userId").and_then(|u| schedules::get(conn, &u)),
    )
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let user_id = match required_str(&req.params, "userId") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    let params: SaveParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let result = schedules::save(conn, &user_id, params.sessions);
    if result.is_ok() {
        state.hub.refresh(conn);
    }
    respond(&req.id, result)
}

fn handle_get_friend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        friend_params(&req.params).and_then(|(u, f)| schedules::get_friend(conn, &u, &f)),
    )
}

fn handle_copy_from_friend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let mode_raw = optional_str(&req.params, "mode").unwrap_or_else(|| "replace".to_string());
    let Some(mode) = CopyMode::parse(&mode_raw) else {
        return fail(
            &req.id,
            PortalError::bad_params(format!("mode must be replace or append, got {mode_raw}")),
        );
    };
    let result = friend_params(&req.params)
        .and_then(|(u, f)| schedules::copy_from_friend(conn, &u, &f, mode));
    if result.is_ok() {
        state.hub.refresh(conn);
    }
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.get" => Some(handle_get(state, req)),
        "schedules.save" => Some(handle_save(state, req)),
        "schedules.getFriend" => Some(handle_get_friend(state, req)),
        "schedules.copyFromFriend" => Some(handle_copy_from_friend(state, req)),
        _ => None,
    }
}
