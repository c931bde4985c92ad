use crate::backend::Connection;
use crate::error::OctobeError;
use crate::results::{ExecResult, Rows};
use crate::scan::FromRow;
use crate::scheme::Scheme;
use crate::types::RowValues;

/// One SQL statement bound to positional arguments, executed at most once.
///
/// Created by [`Scheme::segment`]. The first call to `exec`, `query` or `query_row` consumes the
/// segment, whether or not the statement succeeds; every later call fails with
/// `OctobeError::AlreadyExecuted`.
///
/// ```rust,no_run
/// use octobe::prelude::*;
///
/// # async fn demo(scheme: &Scheme<SqliteConnection>) -> Result<(), OctobeError> {
/// let mut seg = scheme.segment("UPDATE products SET name = $2 WHERE id = $1");
/// seg.arguments(args![1, "mirror"]);
/// let res = seg.exec().await?;
/// assert_eq!(res.rows_affected()?, 1);
///
/// assert!(seg.exec().await.is_err_and(|e| e.is(ErrorKind::AlreadyExecuted)));
/// # Ok(()) }
/// ```
pub struct Segment<'s, C: Connection> {
    scheme: &'s Scheme<C>,
    sql: String,
    args: Vec<RowValues>,
    executed: bool,
}

impl<'s, C: Connection> Segment<'s, C> {
    pub(crate) fn new(scheme: &'s Scheme<C>, sql: String) -> Self {
        Self {
            scheme,
            sql,
            args: Vec::new(),
            executed: false,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn args(&self) -> &[RowValues] {
        &self.args
    }

    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Replace the bound arguments. Ignored once the segment has been executed.
    pub fn arguments<I, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        if self.executed {
            tracing::debug!(sql = %self.sql, "arguments ignored on executed segment");
            return self;
        }
        self.args = values.into_iter().map(Into::into).collect();
        self
    }

    // check and set in one step: `&mut self` rules out a concurrent second execution
    fn start(&mut self, op: &'static str) -> Result<(), OctobeError> {
        if std::mem::replace(&mut self.executed, true) {
            return Err(OctobeError::AlreadyExecuted);
        }
        tracing::debug!(op, sql = %self.sql, args = self.args.len(), "executing segment");
        Ok(())
    }

    /// Run a statement for its side effects.
    ///
    /// # Errors
    /// Returns `OctobeError::AlreadyExecuted` on a second execution, otherwise the driver's error.
    pub async fn exec(&mut self) -> Result<ExecResult, OctobeError> {
        self.start("exec")?;
        self.scheme.run_execute(&self.sql, &self.args).await
    }

    /// Run a row-returning statement and hand its cursor to `handler`.
    ///
    /// The handler iterates and scans rows and may abort with an error, which is returned
    /// unchanged. The cursor is released before this call returns, on every path.
    ///
    /// # Errors
    /// Returns `OctobeError::AlreadyExecuted` on a second execution, the driver's error, or the
    /// handler's error.
    pub async fn query<F, T>(&mut self, handler: F) -> Result<T, OctobeError>
    where
        F: FnOnce(&mut Rows) -> Result<T, OctobeError>,
    {
        self.start("query")?;
        let result_set = self.scheme.run_query(&self.sql, &self.args).await?;
        let mut rows = Rows::new(result_set);
        let outcome = handler(&mut rows);
        if rows.remaining() > 0 {
            tracing::trace!(unread = rows.remaining(), "closing cursor with unread rows");
        }
        drop(rows);
        outcome
    }

    /// Run a statement expected to return one row and scan it into `T`.
    ///
    /// Extra rows are never read.
    ///
    /// # Errors
    /// Returns `OctobeError::AlreadyExecuted` on a second execution, `OctobeError::NoRows` when
    /// the statement yields no rows, `OctobeError::ScanError` on mismatch, or the driver's error.
    pub async fn query_row<T: FromRow>(&mut self) -> Result<T, OctobeError> {
        self.start("query_row")?;
        let result_set = self.scheme.run_query_first(&self.sql, &self.args).await?;
        let row = Rows::new(result_set).next().ok_or(OctobeError::NoRows)?;
        row.scan()
    }
}

impl<C: Connection> std::fmt::Debug for Segment<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("sql", &self.sql)
            .field("args", &self.args)
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}
