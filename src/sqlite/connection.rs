use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::InterruptHandle;
use tokio::sync::Mutex;

use super::params::Params;
use super::query::build_limited_result_set;
use super::transaction::SqliteTransaction;
use crate::backend::{Connection, IsolationLevel, TxOptions};
use crate::error::OctobeError;
use crate::results::{ExecResult, ResultSet};
use crate::translation::{PlaceholderStyle, translate_placeholders};
use crate::types::RowValues;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// A single rusqlite connection driven from async code.
///
/// Statements run on tokio's blocking pool. A transaction holds the connection's session gate
/// from `BEGIN` until it ends, so autocommit statements issued meanwhile wait for it instead of
/// joining it.
pub struct SqliteConnection {
    conn: SharedSqliteConnection,
    gate: Arc<Mutex<()>>,
    interrupt: Arc<InterruptHandle>,
    translate_placeholders: bool,
}

impl SqliteConnection {
    /// Wrap an already open rusqlite connection.
    ///
    /// With `translate_placeholders`, `$N` placeholders are rewritten to `?N` before preparing.
    #[must_use]
    pub fn from_rusqlite(conn: rusqlite::Connection, translate_placeholders: bool) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            gate: Arc::new(Mutex::new(())),
            interrupt,
            translate_placeholders,
        }
    }

    #[must_use]
    pub fn translates_placeholders(&self) -> bool {
        self.translate_placeholders
    }

    /// Run several `;`-separated statements without arguments, e.g. schema setup.
    ///
    /// # Errors
    /// Returns `OctobeError::SqliteError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), OctobeError> {
        let _gate = self.gate.lock().await;
        let sql = sql.to_owned();
        run_blocking(Arc::clone(&self.conn), move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    /// Run synchronous work against the raw rusqlite connection on the blocking pool.
    ///
    /// # Errors
    /// Returns whatever `func` returns, or `OctobeError::ExecutionError` if the blocking task
    /// panicked.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, OctobeError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, OctobeError> + Send + 'static,
        R: Send + 'static,
    {
        let _gate = self.gate.lock().await;
        run_blocking(Arc::clone(&self.conn), func).await
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("translate_placeholders", &self.translate_placeholders)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    type Transaction = SqliteTransaction;

    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        let _gate = self.gate.lock().await;
        execute_on(
            Arc::clone(&self.conn),
            prepare_sql(sql, self.translate_placeholders),
            Params::convert(args),
        )
        .await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        let _gate = self.gate.lock().await;
        query_on(
            Arc::clone(&self.conn),
            prepare_sql(sql, self.translate_placeholders),
            Params::convert(args),
            None,
        )
        .await
    }

    async fn query_first(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        let _gate = self.gate.lock().await;
        query_on(
            Arc::clone(&self.conn),
            prepare_sql(sql, self.translate_placeholders),
            Params::convert(args),
            Some(1),
        )
        .await
    }

    async fn begin(&self, options: TxOptions) -> Result<SqliteTransaction, OctobeError> {
        let gate = Arc::clone(&self.gate).lock_owned().await;
        let statement = begin_statement(options.isolation);
        let read_only = options.read_only;
        run_blocking(Arc::clone(&self.conn), move |conn| {
            conn.execute_batch(statement)?;
            // after BEGIN: IMMEDIATE takes the write lock, which query_only forbids
            if !read_only {
                return Ok(());
            }
            if let Err(err) = conn.execute_batch("PRAGMA query_only = 1") {
                if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback_err, "rollback after failed query_only failed");
                }
                return Err(err.into());
            }
            Ok(())
        })
        .await?;
        tracing::debug!(statement, read_only, "sqlite transaction started");
        Ok(SqliteTransaction::new(
            Arc::clone(&self.conn),
            gate,
            Arc::clone(&self.interrupt),
            self.translate_placeholders,
            read_only,
        ))
    }

    fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

/// SQLite transactions are always serializable; the stricter levels take the write lock up front.
pub(crate) fn begin_statement(isolation: IsolationLevel) -> &'static str {
    match isolation {
        IsolationLevel::Serializable | IsolationLevel::Linearizable => "BEGIN IMMEDIATE",
        _ => "BEGIN DEFERRED",
    }
}

pub(crate) fn prepare_sql(sql: &str, translate: bool) -> String {
    if translate {
        translate_placeholders(sql, PlaceholderStyle::Sqlite).into_owned()
    } else {
        sql.to_owned()
    }
}

pub(crate) async fn execute_on(
    conn: SharedSqliteConnection,
    sql: String,
    params: Params,
) -> Result<ExecResult, OctobeError> {
    run_blocking(conn, move |conn| {
        let changed = {
            let mut stmt = conn.prepare_cached(&sql)?;
            stmt.execute(rusqlite::params_from_iter(params.as_values().iter()))?
        };
        let rows_affected = u64::try_from(changed).map_err(|e| {
            OctobeError::ExecutionError(format!("Invalid rows affected count: {e}"))
        })?;
        Ok(ExecResult::new(rows_affected, Some(conn.last_insert_rowid())))
    })
    .await
}

pub(crate) async fn query_on(
    conn: SharedSqliteConnection,
    sql: String,
    params: Params,
    limit: Option<usize>,
) -> Result<ResultSet, OctobeError> {
    run_blocking(conn, move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        build_limited_result_set(&mut stmt, params.as_values(), limit)
    })
    .await
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, OctobeError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, OctobeError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| OctobeError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
