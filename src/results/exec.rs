use crate::error::OctobeError;

/// Outcome of a side-effecting statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    #[must_use]
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    /// Number of rows inserted, updated or deleted.
    ///
    /// # Errors
    /// Never fails for the bundled drivers; the `Result` leaves room for drivers that cannot count.
    pub fn rows_affected(&self) -> Result<u64, OctobeError> {
        Ok(self.rows_affected)
    }

    /// Row id generated by the statement.
    ///
    /// # Errors
    /// Returns `OctobeError::Unsupported` when the driver does not report insert ids
    /// (Postgres: use `RETURNING` with `query_row` instead).
    pub fn last_insert_id(&self) -> Result<i64, OctobeError> {
        self.last_insert_id.ok_or_else(|| {
            OctobeError::Unsupported("last insert id is not reported by this driver".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn missing_insert_id_is_unsupported() {
        let res = ExecResult::new(3, None);
        assert_eq!(res.rows_affected().ok(), Some(3));
        assert!(
            res.last_insert_id()
                .is_err_and(|e| e.is(ErrorKind::Unsupported))
        );
    }
}
