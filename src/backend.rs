//! The seam between schemes and concrete database drivers.
//!
//! `SqliteConnection` and `PostgresConnection` implement these traits; any other driver can
//! be plugged into [`Octobe`](crate::Octobe) the same way.

use std::fmt;

use async_trait::async_trait;

use crate::error::OctobeError;
use crate::results::{ExecResult, ResultSet};
use crate::types::RowValues;

/// Isolation level requested when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Whatever the database uses by default.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::Default => "DEFAULT",
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::WriteCommitted => "WRITE COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Snapshot => "SNAPSHOT",
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Linearizable => "LINEARIZABLE",
        };
        f.write_str(name)
    }
}

/// Options for [`Octobe::begin_tx`](crate::Octobe::begin_tx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// An open database connection that can run statements in autocommit mode and start
/// transactions.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Transaction: Transaction;

    /// Run a side-effecting statement with positional arguments.
    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError>;

    /// Run a row-returning statement with positional arguments.
    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError>;

    /// Run a row-returning statement when only its first row is wanted.
    ///
    /// Drivers stop reading after that row; the default falls back to [`Connection::query`].
    async fn query_first(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.query(sql, args).await
    }

    /// Start a transaction. Autocommit statements on this connection wait until it ends.
    async fn begin(&self, options: TxOptions) -> Result<Self::Transaction, OctobeError>;

    /// Best-effort abort of whatever statement is running on this connection.
    fn interrupt(&self) {}
}

/// An open transaction. Commit and rollback each succeed at most once.
#[async_trait]
pub trait Transaction: Send + Sync + 'static {
    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError>;

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError>;

    /// See [`Connection::query_first`].
    async fn query_first(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.query(sql, args).await
    }

    async fn commit(&self) -> Result<(), OctobeError>;

    async fn rollback(&self) -> Result<(), OctobeError>;

    fn interrupt(&self) {}
}
