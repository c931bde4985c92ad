use std::collections::HashMap;
use std::sync::Arc;

use crate::error::OctobeError;
use crate::scan::{FromRow, FromValue};
use crate::types::RowValues;

/// Column names of a result set plus a name-to-position lookup, shared by all its rows.
#[derive(Debug, Default)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            // duplicate names resolve to the first occurrence
            positions.entry(name.clone()).or_insert(idx);
        }
        Self { names, positions }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One result row.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<ColumnIndex>,
    values: Vec<RowValues>,
}

impl Row {
    #[must_use]
    pub fn new(columns: Arc<ColumnIndex>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of a column by name.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&RowValues> {
        self.columns
            .position(column)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// Column by name, converted to `T`.
    ///
    /// # Errors
    /// Returns `OctobeError::ScanError` if the column is missing or cannot convert to `T`.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, OctobeError> {
        let value = self.value(column).ok_or_else(|| OctobeError::ScanError {
            column: column.to_string(),
            message: "no such column".into(),
        })?;
        convert(column, value)
    }

    /// Column by position, converted to `T`.
    ///
    /// # Errors
    /// Returns `OctobeError::ScanError` if the index is out of range or cannot convert to `T`.
    pub fn get_index<T: FromValue>(&self, index: usize) -> Result<T, OctobeError> {
        let value = self.values.get(index).ok_or_else(|| OctobeError::ScanError {
            column: index.to_string(),
            message: format!("index out of range for {} columns", self.values.len()),
        })?;
        let label = self
            .columns
            .names()
            .get(index)
            .map_or_else(|| index.to_string(), Clone::clone);
        convert(&label, value)
    }

    /// Scan the whole row into `T`, typically a tuple of destinations.
    ///
    /// # Errors
    /// Returns `OctobeError::ScanError` on column count or type mismatch.
    pub fn scan<T: FromRow>(&self) -> Result<T, OctobeError> {
        T::from_row(self)
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}

fn convert<T: FromValue>(column: &str, value: &RowValues) -> Result<T, OctobeError> {
    T::from_value(value).ok_or_else(|| OctobeError::ScanError {
        column: column.to_string(),
        message: format!(
            "converting {} value into {}",
            value.type_name(),
            T::expected()
        ),
    })
}
