//! crates/study_tracker_core/src/coercion.rs
//!
//! The boundary where untyped worksheet cells become strict records.
//! Nothing past this module looks at a `Cell`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::domain::{
    Cell, CommentEntry, StudyEntry, Table, CONTENT_COLUMN, DATE_COLUMN, NICKNAME_COLUMN,
    PAGES_COLUMN, PASSWORD_COLUMN,
};

/// Date-only layouts accepted in the `Date` column, tried in order.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y. %m. %d", "%Y.%m.%d", "%m/%d/%Y"];

/// Date-time layouts; the time part is discarded.
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Day zero of spreadsheet serial dates.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoercionError {
    #[error("Missing required column '{0}'")]
    MissingColumn(String),
    #[error("Sheet row {row}: cannot parse '{value}' as a date")]
    InvalidDate { row: usize, value: String },
}

/// Removes rows whose every cell is blank.
pub fn drop_empty_rows(mut table: Table) -> Table {
    table.retain_rows(|row| !row.iter().all(Cell::is_blank));
    table
}

/// Reads a page count. Anything that is not a finite, non-negative number
/// counts as zero, so the cumulative total can never go down.
pub fn parse_pages(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Cell::Empty => 0.0,
    };
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

/// Reads a calendar date from text in one of the accepted layouts, or from a
/// spreadsheet serial day number.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Empty => None,
        Cell::Number(serial) => {
            if !serial.is_finite() {
                return None;
            }
            let (y, m, d) = SERIAL_EPOCH;
            let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
            let days = Duration::try_days(serial.floor() as i64)?;
            epoch.checked_add_signed(days)
        }
        Cell::Text(raw) => {
            let text = raw.trim();
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .or_else(|| {
                    DATE_TIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                        .map(|dt| dt.date())
                })
                .or_else(|| {
                    DateTime::parse_from_rfc3339(text)
                        .ok()
                        .map(|dt| dt.date_naive())
                })
        }
    }
}

/// Converts the Study worksheet into entries, in sheet order.
///
/// Blank rows are skipped. A date that cannot be parsed fails the whole
/// table, since there is no sensible position on the time axis for it.
pub fn coerce_study_table(table: &Table) -> Result<Vec<StudyEntry>, CoercionError> {
    let has_data = table.rows().iter().any(|r| !r.iter().all(Cell::is_blank));
    if !has_data {
        return Ok(Vec::new());
    }

    let date_index = table
        .column_index(DATE_COLUMN)
        .ok_or_else(|| CoercionError::MissingColumn(DATE_COLUMN.to_string()))?;
    let pages_index = table
        .column_index(PAGES_COLUMN)
        .ok_or_else(|| CoercionError::MissingColumn(PAGES_COLUMN.to_string()))?;

    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.iter().all(Cell::is_blank))
        .map(|(index, row)| {
            let date = parse_date(&row[date_index]).ok_or_else(|| CoercionError::InvalidDate {
                // +1 for the header, +1 for one-based sheet rows
                row: index + 2,
                value: row[date_index].to_text(),
            })?;
            Ok(StudyEntry {
                date,
                pages: parse_pages(&row[pages_index]),
            })
        })
        .collect()
}

/// Converts the Comments worksheet into entries, in sheet order. All fields
/// pass through as text; missing columns read as empty.
pub fn coerce_comment_table(table: &Table) -> Vec<CommentEntry> {
    let text_at = |row: usize, column: &str| {
        table
            .cell(row, column)
            .map(Cell::to_text)
            .unwrap_or_default()
    };

    (0..table.len())
        .filter(|&row| !table.rows()[row].iter().all(Cell::is_blank))
        .map(|row| CommentEntry {
            timestamp: text_at(row, DATE_COLUMN),
            nickname: text_at(row, NICKNAME_COLUMN),
            content: text_at(row, CONTENT_COLUMN),
            password: table
                .cell(row, PASSWORD_COLUMN)
                .filter(|c| !c.is_blank())
                .map(Cell::to_text),
        })
        .collect()
}
