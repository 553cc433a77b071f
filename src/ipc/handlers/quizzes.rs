use crate::error::Result;
use crate::ipc::error::{fail, ok};
use crate::ipc::helpers::{no_workspace, optional_str, parse_params, required_i64, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Question;
use crate::store::quizzes::{self, NewAttempt, NewQuiz, Requester, TakerQuiz};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuizParams {
    title: String,
    subject: String,
    creator: String,
    #[serde(default)]
    description: Option<String>,
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAttemptParams {
    quiz_id: i64,
    participant_name: String,
    answers: Vec<Option<usize>>,
}

fn handle_quizzes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "quizzes": [] }));
    };
    match quizzes::list(conn) {
        Ok(list) => {
            let list: Vec<TakerQuiz> = list.into_iter().map(TakerQuiz::from).collect();
            ok(&req.id, json!({ "quizzes": list }))
        }
        Err(e) => fail(&req.id, e),
    }
}

fn handle_quizzes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let requested_by = optional_str(&req.params, "requestedBy");
    let requester = Requester {
        admin: state.admin,
        name: requested_by.as_deref(),
    };
    match required_i64(&req.params, "id").and_then(|id| quizzes::get(conn, id)) {
        Ok(quiz) if requester.owns(&quiz) => respond(&req.id, Ok(quiz)),
        Ok(quiz) => respond(&req.id, Ok(TakerQuiz::from(quiz))),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_quizzes_get_by_code(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let found: Result<TakerQuiz> = required_str(&req.params, "code")
        .and_then(|code| quizzes::get_by_code(conn, &code))
        .map(TakerQuiz::from);
    respond(&req.id, found)
}

fn handle_quizzes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let params: CreateQuizParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    respond(
        &req.id,
        quizzes::create(
            conn,
            NewQuiz {
                title: params.title,
                subject: params.subject,
                creator: params.creator,
                description: params.description,
                questions: params.questions,
            },
        ),
    )
}

fn handle_quizzes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let id = match required_i64(&req.params, "id") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    let requested_by = optional_str(&req.params, "requestedBy");
    let requester = Requester {
        admin: state.admin,
        name: requested_by.as_deref(),
    };
    match quizzes::delete(conn, id, requester) {
        Ok(attempts) => ok(
            &req.id,
            json!({ "ok": true, "id": id, "attemptsDeleted": attempts }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_quizzes_results(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        required_i64(&req.params, "quizId").and_then(|id| quizzes::results(conn, id)),
    )
}

fn handle_attempts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    match required_i64(&req.params, "quizId").and_then(|id| quizzes::list_attempts(conn, id)) {
        Ok(list) => ok(&req.id, json!({ "attempts": list })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_attempts_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let params: CreateAttemptParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    respond(
        &req.id,
        quizzes::create_attempt(
            conn,
            NewAttempt {
                quiz_id: params.quiz_id,
                participant_name: params.participant_name,
                answers: params.answers,
            },
        ),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "quizzes.list" => Some(handle_quizzes_list(state, req)),
        "quizzes.get" => Some(handle_quizzes_get(state, req)),
        "quizzes.getByCode" => Some(handle_quizzes_get_by_code(state, req)),
        "quizzes.create" => Some(handle_quizzes_create(state, req)),
        "quizzes.delete" => Some(handle_quizzes_delete(state, req)),
        "quizzes.results" => Some(handle_quizzes_results(state, req)),
        "quizAttempts.list" => Some(handle_attempts_list(state, req)),
        "quizAttempts.create" => Some(handle_attempts_create(state, req)),
        _ => None,
    }
}
