use crate::error::{PortalError, Result};
use crate::ipc::error::{fail, ok};
use crate::ipc::helpers::{no_workspace, optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::store::social::{self, NewProfile};
use crate::subscriptions::SubscriptionKind;
use serde_json::json;

fn two_ids(params: &serde_json::Value, other: &str) -> Result<(String, String)> {
    Ok((required_str(params, "userId")?, required_str(params, other)?))
}

fn handle_users_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let new = (required_str(&req.params, "uid"), required_str(&req.params, "email"));
    let (uid, email) = match new {
        (Ok(uid), Ok(email)) => (uid, email),
        (Err(e), _) | (_, Err(e)) => return fail(&req.id, e),
    };
    let result = social::upsert_user(
        conn,
        NewProfile {
            uid,
            email,
            display_name: optional_str(&req.params, "displayName"),
            username: optional_str(&req.params, "username"),
        },
    );
    if result.is_ok() {
        state.hub.refresh(conn);
    }
    respond(&req.id, result)
}

fn handle_users_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        required_str(&req.params, "uid").and_then(|uid| social::get_user(conn, &uid)),
    )
}

fn handle_users_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let user_id = match required_str(&req.params, "userId") {
        Ok(v) => v,
        Err(e) => return fail(&req.id, e),
    };
    let term = optional_str(&req.params, "term").unwrap_or_default();
    match social::search_users(conn, &user_id, &term) {
        Ok(hits) => ok(&req.id, json!({ "users": hits })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_request_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = two_ids(&req.params, "toUserId")
        .and_then(|(from, to)| social::send_request(conn, &from, &to));
    if result.is_ok() {
        state.hub.refresh(conn);
    }
    respond(&req.id, result)
}

fn handle_request_accept(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = two_ids(&req.params, "requestId")
        .and_then(|(user, id)| social::accept_request(conn, &user, &id));
    match result {
        Ok((request, friend)) => {
            state.hub.refresh(conn);
            ok(&req.id, json!({ "request": request, "friendship": friend }))
        }
        Err(e) => fail(&req.id, e),
    }
}

fn handle_request_decline(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = two_ids(&req.params, "requestId")
        .and_then(|(user, id)| social::decline_request(conn, &user, &id));
    if result.is_ok() {
        state.hub.refresh(conn);
    }
    respond(&req.id, result)
}

fn handle_request_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = two_ids(&req.params, "requestId")
        .and_then(|(user, id)| social::cancel_request(conn, &user, &id));
    if result.is_ok() {
        state.hub.refresh(conn);
    }
    respond(&req.id, result)
}

fn handle_requests_incoming(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    match required_str(&req.params, "userId").and_then(|u| social::incoming_requests(conn, &u)) {
        Ok(list) => ok(&req.id, json!({ "requests": list })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_requests_outgoing(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    match required_str(&req.params, "userId").and_then(|u| social::outgoing_requests(conn, &u)) {
        Ok(list) => ok(&req.id, json!({ "requests": list })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_friends_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    match required_str(&req.params, "userId").and_then(|u| social::list_friends(conn, &u)) {
        Ok(list) => ok(&req.id, json!({ "friends": list })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_friends_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = two_ids(&req.params, "friendshipId")
        .and_then(|(user, id)| social::remove_friend(conn, &user, &id));
    match result {
        Ok(other) => {
            state.hub.refresh(conn);
            ok(&req.id, json!({ "ok": true, "removedUserId": other }))
        }
        Err(e) => fail(&req.id, e),
    }
}

fn handle_subscriptions_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let kind = match required_str(&req.params, "kind") {
        Ok(k) => match SubscriptionKind::parse(k.trim()) {
            Some(kind) => kind,
            None => {
                return fail(
                    &req.id,
                    PortalError::bad_params(format!("unknown subscription kind: {k}")),
                )
            }
        },
        Err(e) => return fail(&req.id, e),
    };
    let opened = required_str(&req.params, "userId")
        .and_then(|user| state.hub.open(conn, kind, &user));
    match opened {
        Ok((subscription_id, snapshot)) => ok(
            &req.id,
            json!({
                "subscriptionId": subscription_id,
                "kind": kind.as_str(),
                "snapshot": snapshot,
            }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_subscriptions_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let closed = required_str(&req.params, "subscriptionId").and_then(|id| state.hub.close(&id));
    match closed {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => fail(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.upsert" => Some(handle_users_upsert(state, req)),
        "users.get" => Some(handle_users_get(state, req)),
        "users.search" => Some(handle_users_search(state, req)),
        "friendRequests.send" => Some(handle_request_send(state, req)),
        "friendRequests.accept" => Some(handle_request_accept(state, req)),
        "friendRequests.decline" => Some(handle_request_decline(state, req)),
        "friendRequests.cancel" => Some(handle_request_cancel(state, req)),
        "friendRequests.incoming" => Some(handle_requests_incoming(state, req)),
        "friendRequests.outgoing" => Some(handle_requests_outgoing(state, req)),
        "friends.list" => Some(handle_friends_list(state, req)),
        "friends.remove" => Some(handle_friends_remove(state, req)),
        "subscriptions.open" => Some(handle_subscriptions_open(state, req)),
        "subscriptions.close" => Some(handle_subscriptions_close(state, req)),
        _ => None,
    }
}
