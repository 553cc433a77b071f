use crate::error::PortalError;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::helpers::{
    no_workspace, optional_str, require_admin, required_i64, required_str, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::media::delivery_links;
use crate::store::files::{self, NewFile, UploadLimits};
use serde_json::json;
use std::path::PathBuf;

fn handle_files_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "files": [] }));
    };
    let subject = optional_str(&req.params, "subject");
    let semester = optional_str(&req.params, "semester");
    match files::list(conn, subject.as_deref(), semester.as_deref()) {
        Ok(list) => ok(&req.id, json!({ "files": list })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_files_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        required_i64(&req.params, "id").and_then(|id| files::get(conn, id)),
    )
}

fn handle_files_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(denied) = require_admin(state, req) {
        return denied;
    }
    let (Some(conn), Some(media)) = (state.db.as_ref(), state.media.as_deref()) else {
        return no_workspace(&req.id);
    };

    let source = match required_str(&req.params, "sourcePath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return fail(&req.id, e),
    };
    let file_name = optional_str(&req.params, "fileName").or_else(|| {
        source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
    });
    let new = NewFile {
        title: optional_str(&req.params, "title").unwrap_or_default(),
        subject: optional_str(&req.params, "subject").unwrap_or_default(),
        semester: optional_str(&req.params, "semester").unwrap_or_default(),
        file_name: file_name.unwrap_or_default(),
    };

    let io_failed = |e: std::io::Error| {
        err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": source.to_string_lossy() })),
        )
    };
    let limits = UploadLimits {
        folder: &state.config.media_folder,
        max_bytes: state.config.max_upload_bytes,
    };

    // Oversized sources are refused before anything is read.
    let size = match std::fs::metadata(&source) {
        Ok(meta) => meta.len(),
        Err(e) => return io_failed(e),
    };
    if size > limits.max_bytes {
        return fail(
            &req.id,
            PortalError::bad_params(format!(
                "file is {} bytes, limit is {}",
                size, limits.max_bytes
            )),
        );
    }
    let bytes = match std::fs::read(&source) {
        Ok(b) => b,
        Err(e) => return io_failed(e),
    };

    respond(&req.id, files::upload(conn, media, &limits, new, &bytes))
}

fn handle_files_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(denied) = require_admin(state, req) {
        return denied;
    }
    let (Some(conn), Some(media)) = (state.db.as_ref(), state.media.as_deref()) else {
        return no_workspace(&req.id);
    };
    let id = match required_i64(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    match files::delete(conn, media, id) {
        Ok(_) => ok(&req.id, json!({ "ok": true, "id": id })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_files_links(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let record = match required_i64(&req.params, "id").and_then(|id| files::get(conn, id)) {
        Ok(r) => r,
        Err(e) => return fail(&req.id, e),
    };
    if record.file_path.trim().is_empty() {
        return fail(&req.id, PortalError::bad_params("file has no stored URL"));
    }
    let links = delivery_links(&record.file_path);
    ok(
        &req.id,
        json!({
            "id": record.id,
            "fileName": record.file_name,
            "viewUrl": links.view_url,
            "downloadUrl": links.download_url,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "files.list" => Some(handle_files_list(state, req)),
        "files.get" => Some(handle_files_get(state, req)),
        "files.upload" => Some(handle_files_upload(state, req)),
        "files.delete" => Some(handle_files_delete(state, req)),
        "files.links" => Some(handle_files_links(state, req)),
        _ => None,
    }
}
