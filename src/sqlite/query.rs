use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::OctobeError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract one column of a rusqlite row.
///
/// # Errors
/// Returns `OctobeError::SqliteError` if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, OctobeError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run a prepared statement and materialise every row.
///
/// # Errors
/// Returns `OctobeError::SqliteError` if binding, stepping or reading a column fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, OctobeError> {
    build_limited_result_set(stmt, params, None)
}

/// Like [`build_result_set`], but stops stepping once `limit` rows have been read.
///
/// # Errors
/// Returns `OctobeError::SqliteError` if binding, stepping or reading a column fails.
pub fn build_limited_result_set(
    stmt: &mut Statement,
    params: &[Value],
    limit: Option<usize>,
) -> Result<ResultSet, OctobeError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(column_names, limit.unwrap_or(10).min(10));
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    while limit.is_none_or(|max| result_set.len() < max) {
        let Some(row) = rows.next()? else {
            break;
        };
        let mut values = Vec::with_capacity(col_count);
        for idx in 0..col_count {
            values.push(sqlite_extract_value(row, idx)?);
        }
        result_set.add_row_values(values);
    }

    Ok(result_set)
}
