//! crates/study_tracker_core/src/append_log.rs
//!
//! Turns form submissions into rows and merges them onto the end of an
//! existing worksheet. Rows are only ever added, never edited or removed.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{
    CommentEntry, Record, StudyEntry, Table, CONTENT_COLUMN, DATE_COLUMN, NICKNAME_COLUMN,
    PAGES_COLUMN, PASSWORD_COLUMN,
};

/// Minute precision, written once and never parsed back.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const STUDY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("Page count must be a finite number")]
    InvalidPages,
    #[error("Page count must not be negative")]
    NegativePages,
}

//=========================================================================================
// Submissions
//=========================================================================================

/// A guestbook message as typed into the form.
#[derive(Debug, Clone, Default)]
pub struct CommentSubmission {
    pub nickname: String,
    pub content: String,
    pub password: Option<String>,
}

impl CommentSubmission {
    /// Checks the required fields and stamps the entry with `now`.
    pub fn validate(self, now: NaiveDateTime) -> Result<CommentEntry, ValidationError> {
        let nickname = self.nickname.trim();
        if nickname.is_empty() {
            return Err(ValidationError::EmptyField("Nickname"));
        }
        let content = self.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyField("Message"));
        }

        Ok(CommentEntry {
            timestamp: format_timestamp(now),
            nickname: nickname.to_string(),
            content: content.to_string(),
            password: self.password.filter(|p| !p.trim().is_empty()),
        })
    }
}

/// A study-log line from the admin form. Zero pages is a valid entry.
#[derive(Debug, Clone)]
pub struct StudySubmission {
    pub date: NaiveDate,
    pub pages: f64,
}

impl StudySubmission {
    pub fn validate(self) -> Result<StudyEntry, ValidationError> {
        if !self.pages.is_finite() {
            return Err(ValidationError::InvalidPages);
        }
        if self.pages < 0.0 {
            return Err(ValidationError::NegativePages);
        }
        Ok(StudyEntry {
            date: self.date,
            pages: self.pages,
        })
    }
}

//=========================================================================================
// Rows
//=========================================================================================

pub fn format_timestamp(now: NaiveDateTime) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

pub fn comment_record(entry: &CommentEntry) -> Record {
    let record = Record::new()
        .with(DATE_COLUMN, entry.timestamp.as_str())
        .with(NICKNAME_COLUMN, entry.nickname.as_str())
        .with(CONTENT_COLUMN, entry.content.as_str());
    match &entry.password {
        Some(password) => record.with(PASSWORD_COLUMN, password.as_str()),
        None => record,
    }
}

pub fn study_record(entry: &StudyEntry) -> Record {
    Record::new()
        .with(
            DATE_COLUMN,
            entry.date.format(STUDY_DATE_FORMAT).to_string(),
        )
        .with(PAGES_COLUMN, entry.pages)
}

/// Returns `table` with `record` appended as its last row. The result is the
/// complete new table state, not a delta.
pub fn append_record(table: &Table, record: Record) -> Table {
    let mut next = table.clone();
    next.push_record(record);
    next
}
