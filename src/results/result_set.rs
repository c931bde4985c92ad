use std::sync::Arc;

use super::row::{ColumnIndex, Row};
use crate::types::RowValues;

/// Materialised rows of one query, as produced by a driver.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<ColumnIndex>,
    rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        Self {
            columns: Arc::new(ColumnIndex::new(column_names)),
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(Row::new(Arc::clone(&self.columns), values));
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Arc<ColumnIndex>, Vec<Row>) {
        (self.columns, self.rows)
    }
}
