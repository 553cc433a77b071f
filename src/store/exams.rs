use crate::error::{PortalError, Result};
use crate::model::{Exam, ExamWeek};
use crate::store::{optional_text, parse_date, parse_time, required_text};
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct NewExamWeek {
    pub title: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone)]
pub struct NewExam {
    pub week_id: i64,
    pub subject: String,
    pub date: String,
    pub time: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

fn week_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ExamWeek> {
    Ok(ExamWeek {
        id: r.get(0)?,
        title: r.get(1)?,
        start_date: r.get(2)?,
        end_date: r.get(3)?,
        created_at: r.get(4)?,
    })
}

fn exam_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Exam> {
    Ok(Exam {
        id: r.get(0)?,
        week_id: r.get(1)?,
        subject: r.get(2)?,
        date: r.get(3)?,
        time: r.get(4)?,
        location: r.get(5)?,
        notes: r.get(6)?,
    })
}

pub fn list_weeks(conn: &Connection) -> Result<Vec<ExamWeek>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, start_date, end_date, created_at
         FROM exam_weeks
         ORDER BY start_date, id",
    )?;
    let rows = stmt
        .query_map([], week_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_week(conn: &Connection, id: i64) -> Result<ExamWeek> {
    conn.query_row(
        "SELECT id, title, start_date, end_date, created_at FROM exam_weeks WHERE id = ?",
        [id],
        week_from_row,
    )
    .optional()?
    .ok_or(PortalError::NotFound("exam week"))
}

pub fn create_week(conn: &Connection, new: NewExamWeek) -> Result<ExamWeek> {
    let title = required_text("title", &new.title)?;
    let start = parse_date("startDate", &new.start_date)?;
    let end = parse_date("endDate", &new.end_date)?;
    if start > end {
        return Err(PortalError::bad_params("startDate must not be after endDate"));
    }
    conn.execute(
        "INSERT INTO exam_weeks(title, start_date, end_date, created_at) VALUES(?, ?, ?, ?)",
        (
            &title,
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
            Utc::now(),
        ),
    )?;
    get_week(conn, conn.last_insert_rowid())
}

/// Deletes the week and every exam scheduled in it. Returns the number of
/// exams removed alongside.
pub fn delete_week(conn: &Connection, id: i64) -> Result<usize> {
    get_week(conn, id)?;
    let tx = conn.unchecked_transaction().map_err(PortalError::Tx)?;
    let removed = tx.execute("DELETE FROM exams WHERE week_id = ?", [id])?;
    tx.execute("DELETE FROM exam_weeks WHERE id = ?", [id])?;
    tx.commit().map_err(PortalError::Tx)?;
    Ok(removed)
}

pub fn list_exams(conn: &Connection, week_id: Option<i64>) -> Result<Vec<Exam>> {
    let mut sql =
        String::from("SELECT id, week_id, subject, date, time, location, notes FROM exams");
    let mut binds: Vec<i64> = Vec::new();
    if let Some(w) = week_id {
        sql.push_str(" WHERE week_id = ?");
        binds.push(w);
    }
    sql.push_str(" ORDER BY date, time, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), exam_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_exam(conn: &Connection, id: i64) -> Result<Exam> {
    conn.query_row(
        "SELECT id, week_id, subject, date, time, location, notes FROM exams WHERE id = ?",
        [id],
        exam_from_row,
    )
    .optional()?
    .ok_or(PortalError::NotFound("exam"))
}

pub fn create_exam(conn: &Connection, new: NewExam) -> Result<Exam> {
    get_week(conn, new.week_id)?;
    let subject = required_text("subject", &new.subject)?;
    let date = parse_date("date", &new.date)?;
    let time = parse_time("time", &new.time)?;
    conn.execute(
        "INSERT INTO exams(week_id, subject, date, time, location, notes) VALUES(?, ?, ?, ?, ?, ?)",
        (
            new.week_id,
            &subject,
            date.format("%Y-%m-%d").to_string(),
            time.format("%H:%M").to_string(),
            optional_text(new.location.as_deref()),
            optional_text(new.notes.as_deref()),
        ),
    )?;
    get_exam(conn, conn.last_insert_rowid())
}

pub fn delete_exam(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM exams WHERE id = ?", [id])?;
    if n == 0 {
        return Err(PortalError::NotFound("exam"));
    }
    Ok(())
}
