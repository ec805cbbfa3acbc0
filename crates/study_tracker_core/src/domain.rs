//! crates/study_tracker_core/src/domain.rs
//!
//! Defines the core data structures for the study tracker.
//! Raw spreadsheet tables (`Table`, `Record`, `Cell`) live next to the strict
//! records they are coerced into, but the rest of the core only ever works on
//! the strict types.

use chrono::NaiveDate;

//=========================================================================================
// Column Names
//=========================================================================================

pub const DATE_COLUMN: &str = "Date";
pub const PAGES_COLUMN: &str = "Pages";
pub const NICKNAME_COLUMN: &str = "Nickname";
pub const CONTENT_COLUMN: &str = "Content";
pub const PASSWORD_COLUMN: &str = "Password";

/// The column shape of the Study worksheet.
pub const STUDY_COLUMNS: [&str; 2] = [DATE_COLUMN, PAGES_COLUMN];

/// The column shape of the Comments worksheet.
pub const COMMENT_COLUMNS: [&str; 3] = [DATE_COLUMN, NICKNAME_COLUMN, CONTENT_COLUMN];

/// Label shown for a comment whose nickname was left empty.
pub const ANONYMOUS_NICKNAME: &str = "Anonymous";

//=========================================================================================
// Raw Tables (untyped, as fetched from the store)
//=========================================================================================

/// A single untyped spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// True for cells that carry no value: empty, whitespace-only text, or NaN.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
        }
    }

    /// Renders the cell the way a spreadsheet would display it.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{:.0}", n),
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// One row addressed by column name. Field order is kept so a record can
/// introduce new columns in a predictable position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Cell)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `cell`, replacing any previous value for that column.
    pub fn with(mut self, column: &str, cell: impl Into<Cell>) -> Self {
        let cell = cell.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = cell,
            None => self.fields.push((column.to_string(), cell)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// A whole worksheet: a header row followed by data rows.
///
/// Every row always has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given header.
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from a header and raw rows. Short rows are padded with
    /// `Cell::Empty`; cells past the last named column are dropped.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Appends `record` as the last row. Columns the table does not have yet
    /// are added to the header and filled with `Cell::Empty` in older rows.
    pub fn push_record(&mut self, record: Record) {
        for column in record.columns() {
            if self.column_index(column).is_none() {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Empty);
                }
            }
        }

        let row = self
            .columns
            .iter()
            .map(|name| record.get(name).cloned().unwrap_or(Cell::Empty))
            .collect();
        self.rows.push(row);
    }

    pub fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&Vec<Cell>) -> bool,
    {
        self.rows.retain(keep);
    }
}

//=========================================================================================
// Strict Records
//=========================================================================================

/// One line of the study log: pages read on a given day.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyEntry {
    pub date: NaiveDate,
    pub pages: f64,
}

/// One guestbook message ("whip").
#[derive(Debug, Clone, PartialEq)]
pub struct CommentEntry {
    /// Minute-precision creation time, kept as the text that was written.
    pub timestamp: String,
    pub nickname: String,
    pub content: String,
    /// Collected on submission and stored, never checked.
    pub password: Option<String>,
}

impl CommentEntry {
    pub fn display_nickname(&self) -> &str {
        if self.nickname.trim().is_empty() {
            ANONYMOUS_NICKNAME
        } else {
            &self.nickname
        }
    }
}

//=========================================================================================
// Derived Values
//=========================================================================================

/// The fixed page target progress is measured against. Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGoal(f64);

impl PageGoal {
    pub const DEFAULT_PAGES: f64 = 560.0;

    pub fn new(pages: f64) -> Option<Self> {
        (pages.is_finite() && pages > 0.0).then_some(Self(pages))
    }

    pub fn pages(&self) -> f64 {
        self.0
    }
}

impl Default for PageGoal {
    fn default() -> Self {
        Self(Self::DEFAULT_PAGES)
    }
}

/// A study entry placed on the cumulative curve.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressPoint {
    pub date: NaiveDate,
    pub pages: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSummary {
    pub goal: f64,
    pub done: f64,
    /// Percent of the goal reached, clamped to `0.0..=100.0`.
    pub percent: f64,
    pub remaining: f64,
}

impl ProgressSummary {
    /// Completion as a fraction in `0.0..=1.0`, for progress bars.
    pub fn fraction(&self) -> f64 {
        self.percent / 100.0
    }
}

/// Chart-ready columns sharing one date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub dates: Vec<NaiveDate>,
    pub daily: Vec<f64>,
    pub cumulative: Vec<f64>,
}

/// The study log sorted ascending by date, plus its summary.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyProgress {
    pub log: Vec<ProgressPoint>,
    pub summary: ProgressSummary,
}

impl StudyProgress {
    /// Chart series, or `None` when there is nothing to plot.
    pub fn chart_series(&self) -> Option<ChartSeries> {
        if self.log.is_empty() {
            return None;
        }
        Some(ChartSeries {
            dates: self.log.iter().map(|p| p.date).collect(),
            daily: self.log.iter().map(|p| p.pages).collect(),
            cumulative: self.log.iter().map(|p| p.cumulative).collect(),
        })
    }

    /// The log as the study-log table shows it: latest date first.
    pub fn newest_first(&self) -> impl Iterator<Item = &ProgressPoint> {
        self.log.iter().rev()
    }
}

/// Guestbook messages in storage (insertion) order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Guestbook {
    pub entries: Vec<CommentEntry>,
}

impl Guestbook {
    /// Display order: reverse of insertion, never a timestamp sort.
    pub fn newest_first(&self) -> impl Iterator<Item = &CommentEntry> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
