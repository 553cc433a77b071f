//! Users, friend requests and friendships.
//!
//! A request moves `pending -> accepted | declined | cancelled` exactly once.
//! Accepting creates the friendship in the same transaction, so one accepted
//! request always corresponds to one friendship row. Friendships store their
//! participants ordered (`user_a < user_b`) and the pair is unique.

use crate::error::{PortalError, Result};
use crate::model::{Friend, FriendRequest, Relation, RequestStatus, UserProfile, UserSearchHit};
use crate::store::{optional_text, required_text};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub username: Option<String>,
}

fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn profile_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        uid: r.get(0)?,
        email: r.get(1)?,
        display_name: r.get(2)?,
        username: r.get(3)?,
    })
}

pub fn upsert_user(conn: &Connection, new: NewProfile) -> Result<UserProfile> {
    let uid = required_text("uid", &new.uid)?;
    let email = required_text("email", &new.email)?;
    let display_name = optional_text(new.display_name.as_deref()).unwrap_or_else(|| email.clone());
    let username = optional_text(new.username.as_deref()).unwrap_or_else(|| {
        email
            .split('@')
            .next()
            .unwrap_or(email.as_str())
            .to_string()
    });
    conn.execute(
        "INSERT INTO users(uid, email, display_name, username, updated_at) VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(uid) DO UPDATE SET
           email = excluded.email,
           display_name = excluded.display_name,
           username = excluded.username,
           updated_at = excluded.updated_at",
        (&uid, &email, &display_name, &username, Utc::now()),
    )?;
    get_user(conn, &uid)
}

pub fn get_user(conn: &Connection, uid: &str) -> Result<UserProfile> {
    conn.query_row(
        "SELECT uid, email, display_name, username FROM users WHERE uid = ?",
        [uid],
        profile_from_row,
    )
    .optional()?
    .ok_or(PortalError::NotFound("user"))
}

/// Case-insensitive substring search on email or username, excluding the caller.
pub fn search_users(conn: &Connection, user_id: &str, term: &str) -> Result<Vec<UserSearchHit>> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT uid, email, display_name, username FROM users WHERE uid != ? ORDER BY email",
    )?;
    let candidates = stmt
        .query_map([user_id], profile_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut hits = Vec::new();
    for profile in candidates {
        if profile.email.to_lowercase().contains(&needle)
            || profile.username.to_lowercase().contains(&needle)
        {
            let relation = relation(conn, user_id, &profile.uid)?;
            hits.push(UserSearchHit { profile, relation });
        }
    }
    Ok(hits)
}

pub fn are_friends(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    let (lo, hi) = ordered_pair(a, b);
    Ok(conn
        .query_row(
            "SELECT 1 FROM friendships WHERE user_a = ? AND user_b = ?",
            [lo, hi],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn pending_between(conn: &Connection, from: &str, to: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM friend_requests
             WHERE from_user_id = ? AND to_user_id = ? AND status = 'pending'",
            [from, to],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// How `other` relates to `user_id`.
pub fn relation(conn: &Connection, user_id: &str, other: &str) -> Result<Relation> {
    if are_friends(conn, user_id, other)? {
        return Ok(Relation::Friend);
    }
    if pending_between(conn, user_id, other)? {
        return Ok(Relation::PendingSent);
    }
    if pending_between(conn, other, user_id)? {
        return Ok(Relation::PendingReceived);
    }
    Ok(Relation::None)
}

const SELECT_REQUEST: &str = "SELECT r.id, r.from_user_id, f.email, f.display_name,
            r.to_user_id, t.email, t.display_name, r.status, r.created_at, r.responded_at
     FROM friend_requests r
     JOIN users f ON f.uid = r.from_user_id
     JOIN users t ON t.uid = r.to_user_id";

fn request_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequest> {
    let status: String = r.get(7)?;
    let status = RequestStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown request status {status:?}").into(),
        )
    })?;
    Ok(FriendRequest {
        id: r.get(0)?,
        from_user_id: r.get(1)?,
        from_user_email: r.get(2)?,
        from_user_name: r.get(3)?,
        to_user_id: r.get(4)?,
        to_user_email: r.get(5)?,
        to_user_name: r.get(6)?,
        status,
        created_at: r.get(8)?,
        responded_at: r.get(9)?,
    })
}

pub fn get_request(conn: &Connection, id: &str) -> Result<FriendRequest> {
    conn.query_row(&format!("{SELECT_REQUEST} WHERE r.id = ?"), [id], request_from_row)
        .optional()?
        .ok_or(PortalError::NotFound("friend request"))
}

pub fn send_request(conn: &Connection, from: &str, to: &str) -> Result<FriendRequest> {
    if from == to {
        return Err(PortalError::bad_params("cannot send a friend request to yourself"));
    }
    get_user(conn, from)?;
    get_user(conn, to)?;
    if are_friends(conn, from, to)? {
        return Err(PortalError::conflict("already friends"));
    }
    if pending_between(conn, from, to)? {
        return Err(PortalError::conflict("a request to this user is already pending"));
    }
    if pending_between(conn, to, from)? {
        return Err(PortalError::conflict(
            "this user already sent you a request; accept it instead",
        ));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO friend_requests(id, from_user_id, to_user_id, status, created_at)
         VALUES(?, ?, ?, 'pending', ?)",
        (&id, from, to, Utc::now()),
    )?;
    info!(request_id = %id, from, to, "friend request sent");
    get_request(conn, &id)
}

/// Loads a request and checks it is pending and that `user_id` is the party
/// allowed to move it to `target`.
fn load_for_transition(
    conn: &Connection,
    user_id: &str,
    request_id: &str,
    target: RequestStatus,
) -> Result<FriendRequest> {
    let req = get_request(conn, request_id)?;
    let allowed = match target {
        RequestStatus::Accepted | RequestStatus::Declined => req.to_user_id == user_id,
        RequestStatus::Cancelled => req.from_user_id == user_id,
        RequestStatus::Pending => false,
    };
    if !allowed {
        return Err(PortalError::forbidden(format!(
            "not allowed to mark this request {}",
            target.as_str()
        )));
    }
    if req.status != RequestStatus::Pending {
        return Err(PortalError::conflict(format!(
            "request is already {}",
            req.status.as_str()
        )));
    }
    Ok(req)
}

fn set_status(
    conn: &Connection,
    request_id: &str,
    target: RequestStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    let n = conn.execute(
        "UPDATE friend_requests SET status = ?, responded_at = ?
         WHERE id = ? AND status = 'pending'",
        (target.as_str(), at, request_id),
    )?;
    if n == 0 {
        return Err(PortalError::conflict("request is no longer pending"));
    }
    Ok(())
}

/// Accepts a pending request addressed to `user_id` and creates the friendship.
pub fn accept_request(
    conn: &Connection,
    user_id: &str,
    request_id: &str,
) -> Result<(FriendRequest, Friend)> {
    let req = load_for_transition(conn, user_id, request_id, RequestStatus::Accepted)?;
    let now = Utc::now();
    let (lo, hi) = ordered_pair(&req.from_user_id, &req.to_user_id);
    let friendship_id = Uuid::new_v4().to_string();

    let tx = conn.unchecked_transaction().map_err(PortalError::Tx)?;
    set_status(&tx, request_id, RequestStatus::Accepted, now)?;
    let existing = tx
        .query_row(
            "SELECT 1 FROM friendships WHERE user_a = ? AND user_b = ?",
            [lo, hi],
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(PortalError::conflict("already friends"));
    }
    tx.execute(
        "INSERT INTO friendships(id, user_a, user_b, created_at) VALUES(?, ?, ?, ?)",
        (&friendship_id, lo, hi, now),
    )?;
    tx.commit().map_err(PortalError::Tx)?;
    info!(request_id, friendship_id = %friendship_id, "friend request accepted");

    let req = get_request(conn, request_id)?;
    let friend = list_friends(conn, user_id)?
        .into_iter()
        .find(|f| f.id == friendship_id)
        .ok_or(PortalError::NotFound("friendship"))?;
    Ok((req, friend))
}

pub fn decline_request(conn: &Connection, user_id: &str, request_id: &str) -> Result<FriendRequest> {
    load_for_transition(conn, user_id, request_id, RequestStatus::Declined)?;
    set_status(conn, request_id, RequestStatus::Declined, Utc::now())?;
    info!(request_id, "friend request declined");
    get_request(conn, request_id)
}

pub fn cancel_request(conn: &Connection, user_id: &str, request_id: &str) -> Result<FriendRequest> {
    load_for_transition(conn, user_id, request_id, RequestStatus::Cancelled)?;
    set_status(conn, request_id, RequestStatus::Cancelled, Utc::now())?;
    info!(request_id, "friend request cancelled");
    get_request(conn, request_id)
}

pub fn incoming_requests(conn: &Connection, user_id: &str) -> Result<Vec<FriendRequest>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_REQUEST} WHERE r.to_user_id = ? AND r.status = 'pending' ORDER BY r.created_at, r.id"
    ))?;
    let rows = stmt
        .query_map([user_id], request_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn outgoing_requests(conn: &Connection, user_id: &str) -> Result<Vec<FriendRequest>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_REQUEST} WHERE r.from_user_id = ? AND r.status = 'pending' ORDER BY r.created_at, r.id"
    ))?;
    let rows = stmt
        .query_map([user_id], request_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_friends(conn: &Connection, user_id: &str) -> Result<Vec<Friend>> {
    let mut stmt = conn.prepare(
        "SELECT fs.id, u.uid, u.email, u.display_name, fs.created_at
         FROM friendships fs
         JOIN users u ON u.uid = CASE WHEN fs.user_a = ?1 THEN fs.user_b ELSE fs.user_a END
         WHERE fs.user_a = ?1 OR fs.user_b = ?1
         ORDER BY u.display_name, fs.id",
    )?;
    let rows = stmt
        .query_map([user_id], |r| {
            Ok(Friend {
                id: r.get(0)?,
                user_id: r.get(1)?,
                user_email: r.get(2)?,
                user_name: r.get(3)?,
                friends_since: r.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Removes a friendship; only one of its two participants may do so.
/// Returns the id of the former friend.
pub fn remove_friend(conn: &Connection, user_id: &str, friendship_id: &str) -> Result<String> {
    let pair: Option<(String, String)> = conn
        .query_row(
            "SELECT user_a, user_b FROM friendships WHERE id = ?",
            [friendship_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((a, b)) = pair else {
        return Err(PortalError::NotFound("friendship"));
    };
    let other = if a == user_id {
        b
    } else if b == user_id {
        a
    } else {
        return Err(PortalError::forbidden("not a participant of this friendship"));
    };
    conn.execute("DELETE FROM friendships WHERE id = ?", [friendship_id])?;
    info!(friendship_id, "friendship removed");
    Ok(other)
}
