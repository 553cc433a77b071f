use crate::error::{PortalError, Result};
use crate::model::{Question, Quiz, QuizAttempt};
use crate::store::{optional_text, required_text};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub const CODE_LEN: usize = 8;
const CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub subject: String,
    pub creator: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub participant_name: String,
    pub answers: Vec<Option<usize>>,
}

/// Who is asking to delete a quiz or read its answers.
#[derive(Debug, Clone, Copy)]
pub struct Requester<'a> {
    pub admin: bool,
    pub name: Option<&'a str>,
}

impl Requester<'_> {
    /// Admins and the quiz creator.
    pub fn owns(&self, quiz: &Quiz) -> bool {
        self.admin || self.name.map(|n| n.trim() == quiz.creator).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TakerQuestion {
    pub question: String,
    pub options: Vec<String>,
}

/// A quiz as shown to someone taking it: the correct answers are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TakerQuiz {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub subject: String,
    pub description: Option<String>,
    pub creator: String,
    pub questions: Vec<TakerQuestion>,
    pub created_at: DateTime<Utc>,
}

impl From<Quiz> for TakerQuiz {
    fn from(q: Quiz) -> Self {
        Self {
            id: q.id,
            code: q.code,
            title: q.title,
            subject: q.subject,
            description: q.description,
            creator: q.creator,
            questions: q
                .questions
                .into_iter()
                .map(|qq| TakerQuestion {
                    question: qq.question,
                    options: qq.options,
                })
                .collect(),
            created_at: q.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    pub quiz_id: i64,
    pub attempt_count: usize,
    pub average_percent: Option<f64>,
    pub best_score: Option<i64>,
    pub attempts: Vec<QuizAttempt>,
}

fn quiz_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(Quiz, String)> {
    Ok((
        Quiz {
            id: r.get(0)?,
            code: r.get(1)?,
            title: r.get(2)?,
            subject: r.get(3)?,
            description: r.get(4)?,
            questions: Vec::new(),
            creator: r.get(6)?,
            created_at: r.get(7)?,
        },
        r.get(5)?,
    ))
}

fn hydrate((mut quiz, questions_json): (Quiz, String)) -> Result<Quiz> {
    quiz.questions = serde_json::from_str(&questions_json)?;
    Ok(quiz)
}

const SELECT_QUIZ: &str =
    "SELECT id, code, title, subject, description, questions_json, creator, created_at FROM quizzes";

pub fn list(conn: &Connection) -> Result<Vec<Quiz>> {
    let mut stmt = conn.prepare(&format!("{SELECT_QUIZ} ORDER BY created_at DESC, id DESC"))?;
    let rows = stmt
        .query_map([], quiz_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(hydrate).collect()
}

pub fn get(conn: &Connection, id: i64) -> Result<Quiz> {
    let row = conn
        .query_row(&format!("{SELECT_QUIZ} WHERE id = ?"), [id], quiz_from_row)
        .optional()?
        .ok_or(PortalError::NotFound("quiz"))?;
    hydrate(row)
}

pub fn get_by_code(conn: &Connection, code: &str) -> Result<Quiz> {
    let code = code.trim().to_ascii_uppercase();
    let row = conn
        .query_row(&format!("{SELECT_QUIZ} WHERE code = ?"), [&code], quiz_from_row)
        .optional()?
        .ok_or(PortalError::NotFound("quiz"))?;
    hydrate(row)
}

fn validate_questions(questions: &[Question]) -> Result<()> {
    if questions.is_empty() {
        return Err(PortalError::bad_params("a quiz needs at least one question"));
    }
    for (i, q) in questions.iter().enumerate() {
        if q.question.trim().is_empty() {
            return Err(PortalError::bad_params(format!("question {} has no text", i + 1)));
        }
        if q.options.len() < 2 {
            return Err(PortalError::bad_params(format!(
                "question {} needs at least two options",
                i + 1
            )));
        }
        if q.correct_answer >= q.options.len() {
            return Err(PortalError::bad_params(format!(
                "question {} has correctAnswer {} but only {} options",
                i + 1,
                q.correct_answer,
                q.options.len()
            )));
        }
    }
    Ok(())
}

fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..CODE_LEN].to_ascii_uppercase()
}

fn code_taken(conn: &Connection, code: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM quizzes WHERE code = ?", [code], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

pub fn create(conn: &Connection, new: NewQuiz) -> Result<Quiz> {
    let title = required_text("title", &new.title)?;
    let subject = required_text("subject", &new.subject)?;
    let creator = required_text("creator", &new.creator)?;
    validate_questions(&new.questions)?;

    let mut code = None;
    for _ in 0..CODE_ATTEMPTS {
        let candidate = generate_code();
        if !code_taken(conn, &candidate)? {
            code = Some(candidate);
            break;
        }
    }
    let code = code.ok_or_else(|| PortalError::conflict("could not allocate a unique quiz code"))?;

    conn.execute(
        "INSERT INTO quizzes(code, title, subject, description, questions_json, creator, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &code,
            &title,
            &subject,
            optional_text(new.description.as_deref()),
            serde_json::to_string(&new.questions)?,
            &creator,
            Utc::now(),
        ),
    )?;
    get(conn, conn.last_insert_rowid())
}

/// Deletes a quiz and its attempts. Only an admin or the quiz's creator may do
/// this. Returns the number of attempts removed.
pub fn delete(conn: &Connection, id: i64, requester: Requester<'_>) -> Result<usize> {
    let quiz = get(conn, id)?;
    if !requester.owns(&quiz) {
        return Err(PortalError::forbidden(
            "only an admin or the quiz creator can delete it",
        ));
    }
    let tx = conn.unchecked_transaction().map_err(PortalError::Tx)?;
    let removed = tx.execute("DELETE FROM quiz_attempts WHERE quiz_id = ?", [id])?;
    tx.execute("DELETE FROM quizzes WHERE id = ?", [id])?;
    tx.commit().map_err(PortalError::Tx)?;
    Ok(removed)
}

fn attempt_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(QuizAttempt, String)> {
    Ok((
        QuizAttempt {
            id: r.get(0)?,
            quiz_id: r.get(1)?,
            participant_name: r.get(2)?,
            answers: Vec::new(),
            score: r.get(4)?,
            total_questions: r.get(5)?,
            created_at: r.get(6)?,
        },
        r.get(3)?,
    ))
}

const SELECT_ATTEMPT: &str = "SELECT id, quiz_id, participant_name, answers_json, score, total_questions, created_at
     FROM quiz_attempts";

pub fn list_attempts(conn: &Connection, quiz_id: i64) -> Result<Vec<QuizAttempt>> {
    get(conn, quiz_id)?;
    let mut stmt = conn.prepare(&format!("{SELECT_ATTEMPT} WHERE quiz_id = ? ORDER BY created_at, id"))?;
    let rows = stmt
        .query_map([quiz_id], attempt_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(mut a, answers_json)| {
            a.answers = serde_json::from_str(&answers_json)?;
            Ok(a)
        })
        .collect()
}

/// Counts the answers matching each question's correct option.
pub fn grade(questions: &[Question], answers: &[Option<usize>]) -> Result<i64> {
    if answers.len() != questions.len() {
        return Err(PortalError::bad_params(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }
    let mut score = 0;
    for (i, (q, a)) in questions.iter().zip(answers).enumerate() {
        match a {
            Some(choice) if *choice >= q.options.len() => {
                return Err(PortalError::bad_params(format!(
                    "answer {} is out of range",
                    i + 1
                )))
            }
            Some(choice) if *choice == q.correct_answer => score += 1,
            _ => {}
        }
    }
    Ok(score)
}

pub fn create_attempt(conn: &Connection, new: NewAttempt) -> Result<QuizAttempt> {
    let quiz = get(conn, new.quiz_id)?;
    let participant = required_text("participantName", &new.participant_name)?;
    let score = grade(&quiz.questions, &new.answers)?;
    conn.execute(
        "INSERT INTO quiz_attempts(quiz_id, participant_name, answers_json, score, total_questions, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            quiz.id,
            &participant,
            serde_json::to_string(&new.answers)?,
            score,
            quiz.questions.len() as i64,
            Utc::now(),
        ),
    )?;
    let id = conn.last_insert_rowid();
    let row = conn.query_row(&format!("{SELECT_ATTEMPT} WHERE id = ?"), [id], attempt_from_row)?;
    let (mut attempt, answers_json) = row;
    attempt.answers = serde_json::from_str(&answers_json)?;
    Ok(attempt)
}

pub fn results(conn: &Connection, quiz_id: i64) -> Result<QuizResults> {
    let attempts = list_attempts(conn, quiz_id)?;
    let percents: Vec<f64> = attempts
        .iter()
        .filter(|a| a.total_questions > 0)
        .map(|a| a.score as f64 * 100.0 / a.total_questions as f64)
        .collect();
    let average_percent = if percents.is_empty() {
        None
    } else {
        Some(percents.iter().sum::<f64>() / percents.len() as f64)
    };
    Ok(QuizResults {
        quiz_id,
        attempt_count: attempts.len(),
        average_percent,
        best_score: attempts.iter().map(|a| a.score).max(),
        attempts,
    })
}
