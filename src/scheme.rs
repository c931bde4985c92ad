use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::aggregate::Errors;
use crate::backend::{Connection, Transaction};
use crate::context::Context;
use crate::error::OctobeError;
use crate::handler::{HandleOption, Handler};
use crate::results::{ExecResult, ResultSet};
use crate::segment::Segment;
use crate::types::RowValues;

/// Lifecycle of the transaction behind a transactional [`Scheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    /// A commit or rollback is in flight.
    Finishing,
    Committed,
    RolledBack,
}

impl TxState {
    fn describe(self) -> &'static str {
        match self {
            TxState::Active => "active",
            TxState::Finishing => "finishing",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled back",
        }
    }
}

struct TxSlot<T> {
    tx: Arc<T>,
    state: Mutex<TxState>,
}

impl<T: Transaction> TxSlot<T> {
    fn state(&self) -> MutexGuard<'_, TxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_active(&self) -> Result<(), OctobeError> {
        match *self.state() {
            TxState::Active => Ok(()),
            other => Err(OctobeError::TransactionDone(other.describe())),
        }
    }

    /// Move Active to Finishing; any other state is an error.
    fn claim(&self) -> Result<(), OctobeError> {
        let mut state = self.state();
        match *state {
            TxState::Active => {
                *state = TxState::Finishing;
                Ok(())
            }
            other => Err(OctobeError::TransactionDone(other.describe())),
        }
    }

    fn settle(&self, state: TxState) {
        *self.state() = state;
    }
}

/// A session over one connection, optionally inside a transaction.
///
/// Every statement, handler and commit/rollback issued through the scheme runs on the same
/// transaction (when there is one) and under the scheme's [`Context`]. A transactional scheme
/// dropped while its transaction is still active rolls it back in the background.
pub struct Scheme<C: Connection> {
    conn: Arc<C>,
    tx: Option<TxSlot<C::Transaction>>,
    ctx: Context,
}

impl<C: Connection> Scheme<C> {
    pub(crate) fn plain(conn: Arc<C>, ctx: Context) -> Self {
        Self {
            conn,
            tx: None,
            ctx,
        }
    }

    pub(crate) fn transactional(conn: Arc<C>, tx: C::Transaction, ctx: Context) -> Self {
        Self {
            conn,
            tx: Some(TxSlot {
                tx: Arc::new(tx),
                state: Mutex::new(TxState::Active),
            }),
            ctx,
        }
    }

    /// New one-shot statement bound to this scheme.
    pub fn segment(&self, sql: impl Into<String>) -> Segment<'_, C> {
        Segment::new(self, sql.into())
    }

    /// Run a handler against this scheme.
    ///
    /// Returns `Ok(None)` when the handler fails with an error one of `options` suppresses.
    ///
    /// # Errors
    /// Returns the handler's error unless suppressed.
    pub async fn handle<H>(
        &self,
        handler: H,
        options: &[HandleOption],
    ) -> Result<Option<H::Output>, OctobeError>
    where
        H: Handler<C>,
    {
        match handler.handle(self).await {
            Ok(output) => Ok(Some(output)),
            Err(err) if options.iter().any(|opt| opt.suppresses(&err)) => {
                tracing::debug!(error = %err, "handler error suppressed");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Commit the transaction.
    ///
    /// Runs regardless of the context so it can finish work the context no longer bounds. A
    /// failed commit leaves the transaction active.
    ///
    /// # Errors
    /// `OctobeError::NotTransactional` without a transaction, `OctobeError::TransactionDone` when
    /// it already ended, otherwise the driver's error.
    pub async fn commit(&self) -> Result<(), OctobeError> {
        let slot = self.tx.as_ref().ok_or(OctobeError::NotTransactional)?;
        slot.claim()?;
        match slot.tx.commit().await {
            Ok(()) => {
                slot.settle(TxState::Committed);
                tracing::debug!("transaction committed");
                Ok(())
            }
            Err(err) => {
                slot.settle(TxState::Active);
                Err(err)
            }
        }
    }

    /// Roll the transaction back. Same rules as [`Scheme::commit`].
    ///
    /// # Errors
    /// `OctobeError::NotTransactional` without a transaction, `OctobeError::TransactionDone` when
    /// it already ended, otherwise the driver's error.
    pub async fn rollback(&self) -> Result<(), OctobeError> {
        let slot = self.tx.as_ref().ok_or(OctobeError::NotTransactional)?;
        slot.claim()?;
        match slot.tx.rollback().await {
            Ok(()) => {
                slot.settle(TxState::RolledBack);
                tracing::debug!("transaction rolled back");
                Ok(())
            }
            Err(err) => {
                slot.settle(TxState::Active);
                Err(err)
            }
        }
    }

    /// Roll back when `observe` reports an error.
    ///
    /// `Ok` values pass through untouched. On `Err(e)` the transaction is rolled back and `e` is
    /// returned; if the rollback itself fails, both errors come back as an
    /// `OctobeError::Aggregate` with `e` first. Without a transaction `e` is returned as is.
    ///
    /// ```rust,no_run
    /// use octobe::prelude::*;
    ///
    /// # async fn demo(scheme: &Scheme<SqliteConnection>) -> Result<(), OctobeError> {
    /// let mut seg = scheme.segment("INSERT INTO products(name) VALUES ($1)");
    /// seg.arguments(args!["mirror"]);
    /// let res = seg.exec().await;
    /// scheme.watch_rollback(|| res).await?;
    /// scheme.commit().await
    /// # }
    /// ```
    ///
    /// # Errors
    /// The observed error, possibly aggregated with the rollback failure.
    pub async fn watch_rollback<T, F>(&self, observe: F) -> Result<T, OctobeError>
    where
        F: FnOnce() -> Result<T, OctobeError>,
    {
        let err = match observe() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if self.tx.is_none() {
            return Err(err);
        }
        match self.rollback().await {
            Ok(()) => Err(err),
            Err(rollback_err) => {
                tracing::warn!(
                    error = %err,
                    rollback_error = %rollback_err,
                    "rollback after failure did not complete"
                );
                Err(Errors::from(vec![err, rollback_err]).into())
            }
        }
    }

    #[must_use]
    pub fn is_transactional(&self) -> bool {
        self.tx.is_some()
    }

    /// Transaction state, `None` for a non-transactional scheme.
    #[must_use]
    pub fn state(&self) -> Option<TxState> {
        self.tx.as_ref().map(|slot| *slot.state())
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub(crate) async fn run_execute(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> Result<ExecResult, OctobeError> {
        match &self.tx {
            Some(slot) => {
                slot.ensure_active()?;
                self.ctx
                    .bound(slot.tx.execute(sql, args), || slot.tx.interrupt())
                    .await
            }
            None => {
                self.ctx
                    .bound(self.conn.execute(sql, args), || self.conn.interrupt())
                    .await
            }
        }
    }

    pub(crate) async fn run_query(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> Result<ResultSet, OctobeError> {
        match &self.tx {
            Some(slot) => {
                slot.ensure_active()?;
                self.ctx
                    .bound(slot.tx.query(sql, args), || slot.tx.interrupt())
                    .await
            }
            None => {
                self.ctx
                    .bound(self.conn.query(sql, args), || self.conn.interrupt())
                    .await
            }
        }
    }

    pub(crate) async fn run_query_first(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> Result<ResultSet, OctobeError> {
        match &self.tx {
            Some(slot) => {
                slot.ensure_active()?;
                self.ctx
                    .bound(slot.tx.query_first(sql, args), || slot.tx.interrupt())
                    .await
            }
            None => {
                self.ctx
                    .bound(self.conn.query_first(sql, args), || self.conn.interrupt())
                    .await
            }
        }
    }
}

impl<C: Connection> Drop for Scheme<C> {
    fn drop(&mut self) {
        let Some(slot) = self.tx.take() else {
            return;
        };
        if *slot.state() != TxState::Active {
            return;
        }
        tracing::warn!("scheme dropped with an active transaction; rolling back");
        // without a runtime the driver's own transaction drop does the rollback
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let tx = slot.tx;
            handle.spawn(async move {
                if let Err(err) = tx.rollback().await {
                    tracing::warn!(error = %err, "rollback of abandoned transaction failed");
                }
            });
        }
    }
}

impl<C: Connection> std::fmt::Debug for Scheme<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheme")
            .field("state", &self.state())
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}
