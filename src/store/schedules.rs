use crate::error::{PortalError, Result};
use crate::model::{StudySchedule, StudySession};
use crate::store::{optional_text, parse_time, required_text, social};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

pub const DAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    Replace,
    Append,
}

impl CopyMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "replace" => Some(CopyMode::Replace),
            "append" => Some(CopyMode::Append),
            _ => None,
        }
    }
}

pub fn get(conn: &Connection, user_id: &str) -> Result<StudySchedule> {
    let row: Option<(String, DateTime<Utc>)> = conn
        .query_row(
            "SELECT sessions_json, updated_at FROM study_schedules WHERE user_id = ?",
            [user_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    match row {
        Some((json, updated_at)) => Ok(StudySchedule {
            user_id: user_id.to_string(),
            sessions: serde_json::from_str(&json)?,
            updated_at: Some(updated_at),
        }),
        None => Ok(StudySchedule {
            user_id: user_id.to_string(),
            sessions: Vec::new(),
            updated_at: None,
        }),
    }
}

fn normalize(session: StudySession) -> Result<StudySession> {
    let subject = required_text("subject", &session.subject)?;
    let day = session.day.trim().to_lowercase();
    if !DAYS.contains(&day.as_str()) {
        return Err(PortalError::bad_params(format!("unknown day: {}", session.day)));
    }
    let start = parse_time("startTime", &session.start_time)?;
    let end = parse_time("endTime", &session.end_time)?;
    if start >= end {
        return Err(PortalError::bad_params("startTime must be before endTime"));
    }
    let id = optional_text(Some(session.id.as_str())).unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(StudySession {
        id,
        subject,
        day,
        start_time: start.format("%H:%M").to_string(),
        end_time: end.format("%H:%M").to_string(),
        notes: optional_text(session.notes.as_deref()),
    })
}

/// Replaces the user's whole schedule document.
pub fn save(conn: &Connection, user_id: &str, sessions: Vec<StudySession>) -> Result<StudySchedule> {
    let user_id = required_text("userId", user_id)?;
    let sessions = sessions
        .into_iter()
        .map(normalize)
        .collect::<Result<Vec<_>>>()?;
    conn.execute(
        "INSERT INTO study_schedules(user_id, sessions_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
           sessions_json = excluded.sessions_json,
           updated_at = excluded.updated_at",
        (&user_id, serde_json::to_string(&sessions)?, Utc::now()),
    )?;
    get(conn, &user_id)
}

pub fn get_friend(conn: &Connection, user_id: &str, friend_id: &str) -> Result<StudySchedule> {
    if !social::are_friends(conn, user_id, friend_id)? {
        return Err(PortalError::forbidden("schedules are shared between friends only"));
    }
    get(conn, friend_id)
}

/// Copies a friend's sessions into the caller's schedule with fresh ids.
pub fn copy_from_friend(
    conn: &Connection,
    user_id: &str,
    friend_id: &str,
    mode: CopyMode,
) -> Result<StudySchedule> {
    let theirs = get_friend(conn, user_id, friend_id)?;
    if theirs.sessions.is_empty() {
        return Err(PortalError::NotFound("friend study schedule"));
    }
    let mut sessions = match mode {
        CopyMode::Replace => Vec::new(),
        CopyMode::Append => get(conn, user_id)?.sessions,
    };
    sessions.extend(theirs.sessions.into_iter().map(|s| StudySession {
        id: Uuid::new_v4().to_string(),
        ..s
    }));
    save(conn, user_id, sessions)
}
