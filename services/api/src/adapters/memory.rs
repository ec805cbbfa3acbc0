//! services/api/src/adapters/memory.rs
//!
//! An in-process `TableStore` for local development and tests. Nothing is
//! persisted across restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use study_tracker_core::domain::{Record, Table};
use study_tracker_core::ports::{PortResult, TableStore};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with a worksheet.
    pub fn with_table(mut self, name: &str, table: Table) -> Self {
        self.tables.get_mut().insert(name.to_string(), table);
        self
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn read_table(&self, name: &str) -> PortResult<Table> {
        Ok(self.tables.read().await.get(name).cloned().unwrap_or_default())
    }

    async fn write_table(&self, name: &str, table: &Table) -> PortResult<()> {
        self.tables
            .write()
            .await
            .insert(name.to_string(), table.clone());
        Ok(())
    }

    /// Appends under one write lock, so concurrent appends never lose a row.
    async fn append_row(&self, name: &str, record: &Record) -> PortResult<()> {
        self.tables
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .push_record(record.clone());
        Ok(())
    }
}
