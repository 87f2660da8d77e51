//! In-memory row source for previews and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use codeloom_core::{
    application::{ApplicationError, ports::RowSource},
    domain::Row,
    error::CodeloomResult,
};

/// Rows keyed by `(datasource, table)`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRowSource {
    tables: Arc<RwLock<HashMap<(String, String), Vec<Row>>>>,
}

impl InMemoryRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(
        self,
        datasource: impl Into<String>,
        table: impl Into<String>,
        rows: Vec<Row>,
    ) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert((datasource.into(), table.into()), rows);
        }
        self
    }
}

#[async_trait]
impl RowSource for InMemoryRowSource {
    async fn read_rows(
        &self,
        datasource: &str,
        table: &str,
        filter: Option<&str>,
        max_rows: usize,
        cancel: &CancellationToken,
    ) -> CodeloomResult<Vec<Row>> {
        if cancel.is_cancelled() {
            return Err(ApplicationError::Cancelled.into());
        }

        let tables = self
            .tables
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;
        let rows = tables
            .get(&(datasource.to_string(), table.to_string()))
            .ok_or_else(|| ApplicationError::DataSource {
                datasource: datasource.to_string(),
                reason: format!("unknown table '{}'", table),
            })?;

        let selected: Vec<Row> = rows
            .iter()
            .filter(|row| filter.is_none_or(|f| row.matches(f)))
            .take(max_rows)
            .cloned()
            .collect();
        debug!(datasource, table, rows = selected.len(), "Read preview rows");
        Ok(selected)
    }
}
