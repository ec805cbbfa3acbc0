//! crates/study_tracker_core/src/service.rs
//!
//! The dashboard service ties the pieces together: it runs the read path
//! (fetch, coerce, aggregate) and the write path (validate, append, persist,
//! reload) against a `TableStore`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::append_log::{
    append_record, comment_record, study_record, CommentSubmission, StudySubmission,
    ValidationError,
};
use crate::coercion::{coerce_comment_table, coerce_study_table, drop_empty_rows, CoercionError};
use crate::domain::{
    Guestbook, PageGoal, Record, StudyProgress, Table, COMMENT_COLUMNS, STUDY_COLUMNS,
};
use crate::ports::{Clock, PortError, TableStore};
use crate::progress::summarize;

//=========================================================================================
// Settings and Results
//=========================================================================================

/// How a new row reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Read the worksheet, append locally, write the whole table back.
    #[default]
    Overwrite,
    /// Hand the single row to the store's append operation.
    Append,
}

/// Names of the two worksheets in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheets {
    pub study: String,
    pub comments: String,
}

impl Default for Worksheets {
    fn default() -> Self {
        Self {
            study: "Study".to_string(),
            comments: "Comments".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid submission: {0}")]
    Validation(#[from] ValidationError),
    #[error("Study log could not be read: {0}")]
    Coercion(#[from] CoercionError),
    #[error("Could not read '{sheet}' before saving: {source}")]
    ReadBeforeWrite { sheet: String, source: PortError },
    #[error("Could not save to '{sheet}': {source}")]
    Write { sheet: String, source: PortError },
}

/// Everything one render of the dashboard needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub progress: StudyProgress,
    pub guestbook: Guestbook,
    /// User-facing messages about worksheets that could not be loaded.
    pub notices: Vec<String>,
}

//=========================================================================================
// DashboardService
//=========================================================================================

pub struct DashboardService {
    store: Arc<dyn TableStore>,
    clock: Arc<dyn Clock>,
    goal: PageGoal,
    worksheets: Worksheets,
    write_mode: WriteMode,
    /// Serializes this process's writes; other processes can still race.
    write_lock: Mutex<()>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn TableStore>, clock: Arc<dyn Clock>, goal: PageGoal) -> Self {
        Self {
            store,
            clock,
            goal,
            worksheets: Worksheets::default(),
            write_mode: WriteMode::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_worksheets(mut self, worksheets: Worksheets) -> Self {
        self.worksheets = worksheets;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn goal(&self) -> PageGoal {
        self.goal
    }

    // --- Read Path ---

    /// Loads both worksheets and derives the full dashboard.
    pub async fn load(&self) -> Result<Dashboard, ServiceError> {
        let mut notices = Vec::new();
        let progress = self.load_progress(&mut notices).await?;
        let guestbook = self.load_guestbook(&mut notices).await;
        Ok(Dashboard {
            progress,
            guestbook,
            notices,
        })
    }

    /// Loads the study log and aggregates it. A failed fetch yields an empty
    /// log plus a notice; an unparseable date is an error.
    pub async fn load_progress(
        &self,
        notices: &mut Vec<String>,
    ) -> Result<StudyProgress, ServiceError> {
        let table = self
            .fetch_or_empty(&self.worksheets.study, &STUDY_COLUMNS, notices)
            .await;
        let entries = coerce_study_table(&table)?;
        Ok(summarize(&entries, self.goal))
    }

    /// Loads the guestbook in storage order. A failed fetch yields an empty
    /// guestbook plus a notice.
    pub async fn load_guestbook(&self, notices: &mut Vec<String>) -> Guestbook {
        let table = self
            .fetch_or_empty(&self.worksheets.comments, &COMMENT_COLUMNS, notices)
            .await;
        Guestbook {
            entries: coerce_comment_table(&table),
        }
    }

    async fn fetch_or_empty(&self, sheet: &str, shape: &[&str], notices: &mut Vec<String>) -> Table {
        match self.store.read_table(sheet).await {
            Ok(table) => drop_empty_rows(table),
            Err(e) => {
                warn!("Failed to load worksheet '{}': {}", sheet, e);
                notices.push(format!("Failed to load '{}': {}", sheet, e));
                Table::with_columns(shape)
            }
        }
    }

    // --- Write Path ---

    /// Validates and stores a guestbook message, then reloads.
    pub async fn submit_comment(
        &self,
        submission: CommentSubmission,
    ) -> Result<Dashboard, ServiceError> {
        let entry = submission.validate(self.clock.now())?;
        self.append(
            &self.worksheets.comments,
            &COMMENT_COLUMNS,
            comment_record(&entry),
        )
        .await?;
        info!("Whip from '{}' saved", entry.nickname);
        Ok(self.reload_after_write().await)
    }

    /// Validates and stores a study-log line, then reloads.
    pub async fn record_study(
        &self,
        submission: StudySubmission,
    ) -> Result<Dashboard, ServiceError> {
        let entry = submission.validate()?;
        self.append(&self.worksheets.study, &STUDY_COLUMNS, study_record(&entry))
            .await?;
        info!("Recorded {} pages for {}", entry.pages, entry.date);
        Ok(self.reload_after_write().await)
    }

    /// Reloads once a row is stored. The row is already saved at this point,
    /// so a reload failure becomes a notice on an otherwise empty study log.
    async fn reload_after_write(&self) -> Dashboard {
        match self.load().await {
            Ok(dashboard) => dashboard,
            Err(e) => {
                warn!("Saved, but the dashboard could not be reloaded: {}", e);
                let mut notices = vec![format!("Saved, but the dashboard could not be reloaded: {}", e)];
                let guestbook = self.load_guestbook(&mut notices).await;
                Dashboard {
                    progress: summarize(&[], self.goal),
                    guestbook,
                    notices,
                }
            }
        }
    }

    async fn append(&self, sheet: &str, shape: &[&str], record: Record) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;

        let result = match self.write_mode {
            WriteMode::Append => self.store.append_row(sheet, &record).await,
            WriteMode::Overwrite => {
                // Re-read instead of trusting an earlier render: writing back a
                // fallback empty table would wipe the worksheet.
                let current = self.store.read_table(sheet).await.map_err(|source| {
                    error!("Failed to read '{}' before saving: {}", sheet, source);
                    ServiceError::ReadBeforeWrite {
                        sheet: sheet.to_string(),
                        source,
                    }
                })?;
                let mut base = drop_empty_rows(current);
                if base.columns().is_empty() {
                    base = Table::with_columns(shape);
                }
                self.store
                    .write_table(sheet, &append_record(&base, record))
                    .await
            }
        };

        result.map_err(|source| {
            error!("Failed to save to '{}': {}", sheet, source);
            ServiceError::Write {
                sheet: sheet.to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, CONTENT_COLUMN, DATE_COLUMN, NICKNAME_COLUMN, PAGES_COLUMN};
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeStore {
        tables: StdMutex<HashMap<String, Table>>,
        writes: StdMutex<Vec<(String, Table)>>,
        appends: StdMutex<Vec<(String, Record)>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl FakeStore {
        fn with_table(self, name: &str, table: Table) -> Self {
            self.tables.lock().unwrap().insert(name.to_string(), table);
            self
        }

        fn table(&self, name: &str) -> Table {
            self.tables.lock().unwrap().get(name).cloned().unwrap_or_default()
        }

        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len() + self.appends.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TableStore for FakeStore {
        async fn read_table(&self, name: &str) -> PortResult<Table> {
            if self.fail_reads {
                return Err(PortError::Unexpected("connection refused".into()));
            }
            Ok(self.table(name))
        }

        async fn write_table(&self, name: &str, table: &Table) -> PortResult<()> {
            if self.fail_writes {
                return Err(PortError::Unauthorized);
            }
            self.writes
                .lock()
                .unwrap()
                .push((name.to_string(), table.clone()));
            self.tables
                .lock()
                .unwrap()
                .insert(name.to_string(), table.clone());
            Ok(())
        }

        async fn append_row(&self, name: &str, record: &Record) -> PortResult<()> {
            if self.fail_writes {
                return Err(PortError::Unauthorized);
            }
            self.appends
                .lock()
                .unwrap()
                .push((name.to_string(), record.clone()));
            let mut tables = self.tables.lock().unwrap();
            let table = tables.entry(name.to_string()).or_default();
            table.push_record(record.clone());
            Ok(())
        }
    }

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2024, 1, 4)
                .unwrap()
                .and_hms_opt(22, 5, 9)
                .unwrap(),
        ))
    }

    fn study(rows: &[(&str, &str)]) -> Table {
        let mut table = Table::with_columns(&STUDY_COLUMNS);
        for (date, pages) in rows {
            table.push_record(
                Record::new()
                    .with(DATE_COLUMN, *date)
                    .with(PAGES_COLUMN, *pages),
            );
        }
        table
    }

    fn comments(rows: &[(&str, &str, &str)]) -> Table {
        let mut table = Table::with_columns(&COMMENT_COLUMNS);
        for (date, nick, msg) in rows {
            table.push_record(
                Record::new()
                    .with(DATE_COLUMN, *date)
                    .with(NICKNAME_COLUMN, *nick)
                    .with(CONTENT_COLUMN, *msg),
            );
        }
        table
    }

    fn service(store: Arc<FakeStore>, goal: f64) -> DashboardService {
        DashboardService::new(store, clock(), PageGoal::new(goal).unwrap())
    }

    fn whip(nickname: &str, content: &str) -> CommentSubmission {
        CommentSubmission {
            nickname: nickname.into(),
            content: content.into(),
            password: None,
        }
    }

    #[tokio::test]
    async fn load_derives_progress_from_study_sheet() {
        let store = Arc::new(FakeStore::default().with_table(
            "Study",
            study(&[("2024-01-01", "10"), ("2024-01-03", "5"), ("2024-01-02", "8")]),
        ));

        let dashboard = service(store, 100.0).load().await.unwrap();

        let cumulative: Vec<f64> = dashboard
            .progress
            .log
            .iter()
            .map(|p| p.cumulative)
            .collect();
        assert_eq!(cumulative, vec![10.0, 18.0, 23.0]);
        assert_eq!(dashboard.progress.summary.percent, 23.0);
        assert_eq!(dashboard.progress.summary.remaining, 77.0);
        assert!(dashboard.notices.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_empty_tables() {
        let store = Arc::new(FakeStore {
            fail_reads: true,
            ..Default::default()
        });

        let dashboard = service(store, 560.0).load().await.unwrap();

        assert!(dashboard.progress.log.is_empty());
        assert_eq!(dashboard.progress.summary.remaining, 560.0);
        assert!(dashboard.progress.chart_series().is_none());
        assert!(dashboard.guestbook.is_empty());
        assert_eq!(dashboard.notices.len(), 2);
    }

    #[tokio::test]
    async fn bad_date_fails_the_load() {
        let store = Arc::new(
            FakeStore::default().with_table("Study", study(&[("not a date", "3")])),
        );

        let err = service(store, 560.0).load().await.unwrap_err();
        assert!(matches!(err, ServiceError::Coercion(_)));
    }

    #[tokio::test]
    async fn saved_comment_is_not_reported_as_failed_when_reload_fails() {
        let store = Arc::new(
            FakeStore::default().with_table("Study", study(&[("not a date", "3")])),
        );

        let dashboard = service(store.clone(), 560.0)
            .submit_comment(whip("Dan", "Keep going"))
            .await
            .unwrap();

        assert_eq!(store.table("Comments").len(), 1);
        assert_eq!(dashboard.guestbook.len(), 1);
        assert!(dashboard.progress.log.is_empty());
        assert_eq!(dashboard.notices.len(), 1);
        assert!(dashboard.notices[0].starts_with("Saved"));
    }

    #[tokio::test]
    async fn comment_is_appended_and_shown_first() {
        let store = Arc::new(FakeStore::default().with_table(
            "Comments",
            comments(&[
                ("2024-01-01 10:00", "Ann", "open the book"),
                ("2024-01-02 11:00", "Bo", "no excuses"),
            ]),
        ));

        let dashboard = service(store.clone(), 560.0)
            .submit_comment(whip("Dan", "Keep going"))
            .await
            .unwrap();

        let saved = store.table("Comments");
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.cell(2, NICKNAME_COLUMN), Some(&Cell::text("Dan")));
        assert_eq!(
            saved.cell(2, DATE_COLUMN),
            Some(&Cell::text("2024-01-04 22:05"))
        );

        let first = dashboard.guestbook.newest_first().next().unwrap();
        assert_eq!(first.nickname, "Dan");
        assert_eq!(first.content, "Keep going");
    }

    #[tokio::test]
    async fn overwrite_sends_the_whole_table() {
        let existing = comments(&[("2024-01-01 10:00", "Ann", "open the book")]);
        let store = Arc::new(FakeStore::default().with_table("Comments", existing.clone()));

        service(store.clone(), 560.0)
            .submit_comment(whip("Dan", "Keep going"))
            .await
            .unwrap();

        let writes = store.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        let (sheet, written) = &writes[0];
        assert_eq!(sheet, "Comments");
        assert_eq!(&written.rows()[..1], existing.rows());
        assert_eq!(written.len(), 2);
    }

    #[tokio::test]
    async fn append_mode_sends_only_the_row() {
        let store = Arc::new(FakeStore::default());

        service(store.clone(), 560.0)
            .with_write_mode(WriteMode::Append)
            .record_study(StudySubmission {
                date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
                pages: 12.5,
            })
            .await
            .unwrap();

        assert!(store.writes.lock().unwrap().is_empty());
        let appends = store.appends.lock().unwrap();
        assert_eq!(appends.len(), 1);
        assert_eq!(appends[0].1.get(PAGES_COLUMN), Some(&Cell::Number(12.5)));
    }

    #[tokio::test]
    async fn invalid_comment_never_writes() {
        let existing = comments(&[("2024-01-01 10:00", "Ann", "open the book")]);
        let store = Arc::new(FakeStore::default().with_table("Comments", existing.clone()));
        let service = service(store.clone(), 560.0);

        for submission in [whip("", "hello"), whip("Dan", "   ")] {
            let err = service.submit_comment(submission).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }

        assert_eq!(store.write_count(), 0);
        assert_eq!(store.table("Comments"), existing);
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_not_retried() {
        let store = Arc::new(FakeStore {
            fail_writes: true,
            ..Default::default()
        });

        let err = service(store.clone(), 560.0)
            .submit_comment(whip("Dan", "Keep going"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Write { .. }));
        assert!(store.table("Comments").is_empty());
    }

    #[tokio::test]
    async fn unreadable_sheet_is_not_overwritten() {
        let store = Arc::new(FakeStore {
            fail_reads: true,
            ..Default::default()
        });

        let err = service(store.clone(), 560.0)
            .submit_comment(whip("Dan", "Keep going"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ReadBeforeWrite { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn first_study_entry_creates_the_header() {
        let store = Arc::new(FakeStore::default());

        let dashboard = service(store.clone(), 526.0)
            .record_study(StudySubmission {
                date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
                pages: 26.0,
            })
            .await
            .unwrap();

        let saved = store.table("Study");
        assert_eq!(saved.columns(), &["Date".to_string(), "Pages".to_string()]);
        assert_eq!(dashboard.progress.summary.done, 26.0);
        assert_eq!(dashboard.progress.summary.remaining, 500.0);
    }
}
