use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PortalError, Result};
use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AppState, Request};

/// A trimmed, non-empty string param. Every id and name passes through here,
/// so `" alice"` and `"alice"` address the same record.
pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String> {
    let raw = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| PortalError::bad_params(format!("missing {}", key)))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PortalError::bad_params(format!("{} must not be empty", key)));
    }
    Ok(trimmed.to_string())
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64> {
    match params.get(key) {
        Some(v) => v
            .as_i64()
            .ok_or_else(|| PortalError::bad_params(format!("{} must be an integer", key))),
        None => Err(PortalError::bad_params(format!("missing {}", key))),
    }
}

pub fn optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| PortalError::bad_params(format!("{} must be an integer", key))),
    }
}

/// Deserializes the whole params object into a typed struct.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| PortalError::bad_params(format!("invalid params: {e}")))
}

/// Turns a store result into a protocol response.
pub fn respond<T: Serialize>(id: &str, result: Result<T>) -> serde_json::Value {
    match result.and_then(|v| serde_json::to_value(v).map_err(PortalError::from)) {
        Ok(v) => ok(id, v),
        Err(e) => fail(id, e),
    }
}

pub fn no_workspace(id: &str) -> serde_json::Value {
    err(id, "no_workspace", "select a workspace first", None)
}

pub fn require_admin(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    if state.admin {
        None
    } else {
        Some(err(&req.id, "forbidden", "admin login required", None))
    }
}
