use crate::ipc::helpers::{no_workspace, respond};
use crate::ipc::types::{AppState, Request};
use crate::store::analytics;

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, analytics::summary(conn))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}
