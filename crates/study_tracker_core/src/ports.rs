//! crates/study_tracker_core/src/ports.rs
//!
//! Defines the contracts (traits) the core relies on for everything outside
//! itself: the spreadsheet that owns all data, and the wall clock.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::append_log::append_record;
use crate::domain::{Record, Table};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (HTTP, spreadsheet API).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Whole-worksheet access to the spreadsheet that stores the study log and guestbook.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Returns every row of the named worksheet. A worksheet with no data
    /// reads as an empty table rather than an error.
    async fn read_table(&self, name: &str) -> PortResult<Table>;

    /// Replaces the named worksheet's contents with `table`.
    async fn write_table(&self, name: &str, table: &Table) -> PortResult<()>;

    /// Adds `record` as the last row of the named worksheet.
    ///
    /// The default is read-modify-write through `write_table`, which can lose
    /// a concurrent writer's row. Backends with a native append override it.
    async fn append_row(&self, name: &str, record: &Record) -> PortResult<()> {
        let table = self.read_table(name).await?;
        self.write_table(name, &append_record(&table, record.clone()))
            .await
    }
}

/// Source of the local time used to stamp guestbook messages.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The host's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
