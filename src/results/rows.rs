use std::sync::Arc;

use super::result_set::ResultSet;
use super::row::{ColumnIndex, Row};
use crate::error::OctobeError;
use crate::scan::FromRow;

/// Cursor over the rows of a query, handed to the row handler of `Segment::query`.
///
/// The cursor is owned by the segment call and released when the handler returns.
///
/// ```rust
/// use octobe::prelude::*;
///
/// fn names(rows: &mut Rows) -> Result<Vec<String>, OctobeError> {
///     let mut out = Vec::new();
///     while let Some(row) = rows.next() {
///         let (_, name): (i64, String) = row.scan()?;
///         out.push(name);
///     }
///     Ok(out)
/// }
/// # let _ = names;
/// ```
#[derive(Debug)]
pub struct Rows {
    columns: Arc<ColumnIndex>,
    rows: std::vec::IntoIter<Row>,
}

impl Rows {
    #[must_use]
    pub fn new(result_set: ResultSet) -> Self {
        let (columns, rows) = result_set.into_parts();
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Rows not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Advance and scan the next row into `T`; `None` once the cursor is exhausted.
    ///
    /// # Errors
    /// Returns `OctobeError::ScanError` on column count or type mismatch.
    pub fn scan_next<T: FromRow>(&mut self) -> Result<Option<T>, OctobeError> {
        self.rows.next().map(|row| row.scan()).transpose()
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Rows {}
