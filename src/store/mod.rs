//! Record storage on top of the workspace SQLite database.

pub mod analytics;
pub mod exams;
pub mod files;
pub mod quizzes;
pub mod schedules;
pub mod social;

use crate::error::{PortalError, Result};
use chrono::{NaiveDate, NaiveTime};

pub(crate) fn required_text(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(PortalError::bad_params(format!("{field} must not be empty")));
    }
    Ok(v.to_string())
}

pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| PortalError::bad_params(format!("{field} must be YYYY-MM-DD")))
}

pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| PortalError::bad_params(format!("{field} must be HH:MM")))
}
