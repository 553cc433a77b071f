use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekExamCount {
    pub week_id: i64,
    pub title: String,
    pub exam_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub file_count: i64,
    pub files_by_subject: Vec<LabelCount>,
    pub files_by_semester: Vec<LabelCount>,
    pub quiz_count: i64,
    pub attempt_count: i64,
    pub average_attempt_percent: Option<f64>,
    pub exams_by_week: Vec<WeekExamCount>,
}

fn grouped(conn: &Connection, column: &str) -> Result<Vec<LabelCount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM files GROUP BY {column} ORDER BY COUNT(*) DESC, {column}"
    ))?;
    let rows = stmt
        .query_map([], |r| {
            Ok(LabelCount {
                label: r.get(0)?,
                count: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn summary(conn: &Connection) -> Result<Summary> {
    let file_count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
    let quiz_count: i64 = conn.query_row("SELECT COUNT(*) FROM quizzes", [], |r| r.get(0))?;
    let (attempt_count, average_attempt_percent): (i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*),
                AVG(CASE WHEN total_questions > 0
                         THEN score * 100.0 / total_questions END)
         FROM quiz_attempts",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    // Correlated subquery keeps weeks without exams in the list.
    let mut stmt = conn.prepare(
        "SELECT w.id, w.title, (SELECT COUNT(*) FROM exams e WHERE e.week_id = w.id)
         FROM exam_weeks w
         ORDER BY w.start_date, w.id",
    )?;
    let exams_by_week = stmt
        .query_map([], |r| {
            Ok(WeekExamCount {
                week_id: r.get(0)?,
                title: r.get(1)?,
                exam_count: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Summary {
        file_count,
        files_by_subject: grouped(conn, "subject")?,
        files_by_semester: grouped(conn, "semester")?,
        quiz_count,
        attempt_count,
        average_attempt_percent,
        exams_by_week,
    })
}
