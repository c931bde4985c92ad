use std::sync::Arc;

use crate::aggregate::Errors;
use crate::backend::{Connection, Transaction, TxOptions};
use crate::context::Context;
use crate::error::OctobeError;
use crate::scheme::Scheme;

/// Entry point wrapping one open connection.
///
/// Cheap to clone; clones share the connection. Transactions taken from any clone serialise
/// with each other and with autocommit statements on that connection.
///
/// ```rust,no_run
/// use octobe::prelude::*;
///
/// # async fn demo() -> Result<(), OctobeError> {
/// let conn = SqliteOptionsBuilder::new("shop.db".to_string()).connect().await?;
/// let db = Octobe::new(conn);
///
/// let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
/// let mut seg = scheme.segment("INSERT INTO products(name) VALUES ($1)");
/// seg.arguments(args!["mirror"]);
/// let res = seg.exec().await;
/// scheme.watch_rollback(|| res).await?;
/// scheme.commit().await?;
/// # Ok(()) }
/// ```
pub struct Octobe<C: Connection> {
    conn: Arc<C>,
}

impl<C: Connection> Octobe<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn: Arc::new(conn),
        }
    }

    pub fn from_shared(conn: Arc<C>) -> Self {
        Self { conn }
    }

    #[must_use]
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// A non-transactional scheme: each segment autocommits.
    pub fn begin(&self, ctx: Context) -> Scheme<C> {
        Scheme::plain(Arc::clone(&self.conn), ctx)
    }

    /// Start a transaction and wrap it in a scheme.
    ///
    /// The context is checked before `BEGIN` and again once it has completed; `BEGIN` itself
    /// always runs to the end so the driver never leaves a transaction open without an owner.
    /// A transaction whose context ended meanwhile is rolled back before returning.
    ///
    /// # Errors
    /// The driver's error when the transaction cannot start, or the context's error when it is
    /// cancelled or past its deadline. If the rollback of such a transaction fails as well, both
    /// come back in an `OctobeError::Aggregate`.
    pub async fn begin_tx(&self, ctx: Context, options: TxOptions) -> Result<Scheme<C>, OctobeError> {
        ctx.check()?;
        let tx = self.conn.begin(options).await?;
        if let Err(ctx_err) = ctx.check() {
            return match tx.rollback().await {
                Ok(()) => Err(ctx_err),
                Err(rollback_err) => {
                    tracing::warn!(
                        error = %ctx_err,
                        rollback_error = %rollback_err,
                        "rollback of transaction started past its context failed"
                    );
                    Err(Errors::from(vec![ctx_err, rollback_err]).into())
                }
            };
        }
        tracing::debug!(
            isolation = %options.isolation,
            read_only = options.read_only,
            "transaction started"
        );
        Ok(Scheme::transactional(Arc::clone(&self.conn), tx, ctx))
    }
}

impl<C: Connection> Clone for Octobe<C> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

impl<C: Connection> std::fmt::Debug for Octobe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Octobe").finish_non_exhaustive()
    }
}
