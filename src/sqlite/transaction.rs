use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::InterruptHandle;
use tokio::sync::OwnedMutexGuard;

use super::connection::{SharedSqliteConnection, execute_on, prepare_sql, query_on, run_blocking};
use super::params::Params;
use crate::backend::Transaction;
use crate::error::OctobeError;
use crate::results::{ExecResult, ResultSet};
use crate::types::RowValues;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

/// An open SQLite transaction.
///
/// Holds the connection's session gate until commit or rollback succeeds. Dropping it while
/// still open rolls back on the blocking pool, keeping the gate until that finishes; outside a
/// runtime the rollback runs in place if the connection is free.
pub struct SqliteTransaction {
    conn: SharedSqliteConnection,
    gate: Mutex<Option<OwnedMutexGuard<()>>>,
    interrupt: Arc<InterruptHandle>,
    translate_placeholders: bool,
    read_only: bool,
}

impl SqliteTransaction {
    pub(crate) fn new(
        conn: SharedSqliteConnection,
        gate: OwnedMutexGuard<()>,
        interrupt: Arc<InterruptHandle>,
        translate_placeholders: bool,
        read_only: bool,
    ) -> Self {
        Self {
            conn,
            gate: Mutex::new(Some(gate)),
            interrupt,
            translate_placeholders,
            read_only,
        }
    }

    /// Whether commit or rollback has not yet succeeded.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn ensure_open(&self) -> Result<(), OctobeError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(OctobeError::ExecutionError(
                "SQLite transaction already completed".into(),
            ))
        }
    }

    fn release(&self) {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn rollback_with_busy_retries(&self) -> Result<(), OctobeError> {
        let read_only = self.read_only;
        for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
            let result = run_blocking(Arc::clone(&self.conn), move |conn| {
                conn.execute_batch("ROLLBACK")?;
                if read_only {
                    conn.execute_batch("PRAGMA query_only = 0")?;
                }
                Ok(())
            })
            .await;

            match &result {
                Err(OctobeError::SqliteError(rusqlite::Error::SqliteFailure(err, _)))
                    if err.code == rusqlite::ErrorCode::DatabaseBusy
                        && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
                {
                    tracing::debug!(attempt = idx + 1, "sqlite rollback busy, retrying");
                    tokio::time::sleep(delay).await;
                }
                _ => return result,
            }
        }

        Err(OctobeError::ExecutionError(
            "rollback retries exhausted".into(),
        ))
    }
}

impl fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("open", &self.is_open())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        self.ensure_open()?;
        execute_on(
            Arc::clone(&self.conn),
            prepare_sql(sql, self.translate_placeholders),
            Params::convert(args),
        )
        .await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.ensure_open()?;
        query_on(
            Arc::clone(&self.conn),
            prepare_sql(sql, self.translate_placeholders),
            Params::convert(args),
            None,
        )
        .await
    }

    async fn query_first(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.ensure_open()?;
        query_on(
            Arc::clone(&self.conn),
            prepare_sql(sql, self.translate_placeholders),
            Params::convert(args),
            Some(1),
        )
        .await
    }

    async fn commit(&self) -> Result<(), OctobeError> {
        self.ensure_open()?;
        let read_only = self.read_only;
        run_blocking(Arc::clone(&self.conn), move |conn| {
            conn.execute_batch("COMMIT")?;
            if read_only {
                conn.execute_batch("PRAGMA query_only = 0")?;
            }
            Ok(())
        })
        .await?;
        self.release();
        Ok(())
    }

    async fn rollback(&self) -> Result<(), OctobeError> {
        self.ensure_open()?;
        self.rollback_with_busy_retries().await?;
        self.release();
        Ok(())
    }

    fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        let Some(gate) = self
            .gate
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let read_only = self.read_only;

        // the gate moves with the rollback so nothing else runs on the connection before it
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let conn = Arc::clone(&self.conn);
            handle.spawn_blocking(move || {
                rollback_on_drop(&conn.blocking_lock(), read_only);
                drop(gate);
            });
            return;
        }
        match self.conn.try_lock() {
            Ok(conn) => rollback_on_drop(&conn, read_only),
            Err(_) => tracing::warn!("sqlite connection busy; open transaction dropped without rollback"),
        }
        drop(gate);
    }
}

fn rollback_on_drop(conn: &rusqlite::Connection, read_only: bool) {
    if let Err(err) = conn.execute_batch("ROLLBACK") {
        tracing::warn!(error = %err, "sqlite rollback on drop failed");
    }
    if !read_only {
        return;
    }
    if let Err(err) = conn.execute_batch("PRAGMA query_only = 0") {
        tracing::warn!(error = %err, "sqlite query_only reset on drop failed");
    }
}
