use crate::error::Result;
use crate::ipc::error::{fail, ok};
use crate::ipc::helpers::{
    no_workspace, optional_i64, optional_str, require_admin, required_i64, required_str, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::store::exams::{self, NewExam, NewExamWeek};
use serde_json::json;

fn week_params(params: &serde_json::Value) -> Result<NewExamWeek> {
    Ok(NewExamWeek {
        title: required_str(params, "title")?,
        start_date: required_str(params, "startDate")?,
        end_date: required_str(params, "endDate")?,
    })
}

fn exam_params(params: &serde_json::Value) -> Result<NewExam> {
    Ok(NewExam {
        week_id: required_i64(params, "weekId")?,
        subject: required_str(params, "subject")?,
        date: required_str(params, "date")?,
        time: required_str(params, "time")?,
        location: optional_str(params, "location"),
        notes: optional_str(params, "notes"),
    })
}

fn handle_weeks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "weeks": [] }));
    };
    match exams::list_weeks(conn) {
        Ok(weeks) => ok(&req.id, json!({ "weeks": weeks })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_weeks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        required_i64(&req.params, "id").and_then(|id| exams::get_week(conn, id)),
    )
}

fn handle_weeks_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(denied) = require_admin(state, req) {
        return denied;
    }
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        week_params(&req.params).and_then(|n| exams::create_week(conn, n)),
    )
}

fn handle_weeks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(denied) = require_admin(state, req) {
        return denied;
    }
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let id = match required_i64(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    match exams::delete_week(conn, id) {
        Ok(removed) => ok(
            &req.id,
            json!({ "ok": true, "id": id, "examsDeleted": removed }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "exams": [] }));
    };
    let listed = optional_i64(&req.params, "weekId").and_then(|w| exams::list_exams(conn, w));
    match listed {
        Ok(list) => ok(&req.id, json!({ "exams": list })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(denied) = require_admin(state, req) {
        return denied;
    }
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        exam_params(&req.params).and_then(|n| exams::create_exam(conn, n)),
    )
}

fn handle_exams_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(denied) = require_admin(state, req) {
        return denied;
    }
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let id = match required_i64(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    match exams::delete_exam(conn, id) {
        Ok(()) => ok(&req.id, json!({ "ok": true, "id": id })),
        Err(e) => fail(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "examWeeks.list" => Some(handle_weeks_list(state, req)),
        "examWeeks.get" => Some(handle_weeks_get(state, req)),
        "examWeeks.create" => Some(handle_weeks_create(state, req)),
        "examWeeks.delete" => Some(handle_weeks_delete(state, req)),
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.delete" => Some(handle_exams_delete(state, req)),
        _ => None,
    }
}
