use std::error::Error as StdError;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

use crate::aggregate::Errors;

/// Coarse classification used for suppression and matching.
///
/// Matching never compares messages; it asks each error (and every error it wraps or
/// aggregates) which kind it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A segment was executed a second time.
    AlreadyExecuted,
    /// A single-row query produced no rows.
    NotFound,
    /// Column count or type did not match the scan destination.
    Scan,
    /// Commit/rollback misuse: non-transactional scheme or transaction already finished.
    Transaction,
    /// The scheme's context was cancelled.
    Cancelled,
    /// The scheme's context deadline passed.
    DeadlineExceeded,
    /// Error reported by the underlying driver.
    Driver,
    /// Invalid backend options.
    Config,
    /// The driver cannot answer this request.
    Unsupported,
    /// Several errors collected together.
    Aggregate,
    /// Caller-originated error.
    Other,
}

#[derive(Debug, Error)]
pub enum OctobeError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("segment has already been executed")]
    AlreadyExecuted,

    #[error("no rows in result set")]
    NoRows,

    #[error("scan error on column {column}: {message}")]
    ScanError { column: String, message: String },

    #[error("scheme is not transactional")]
    NotTransactional,

    #[error("transaction already {0}")]
    TransactionDone(&'static str),

    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Aggregate(#[from] Errors),

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<OctobeError>,
    },

    #[error(transparent)]
    Custom(Box<dyn StdError + Send + Sync + 'static>),

    #[error("{0}")]
    Other(String),
}

impl OctobeError {
    /// Caller-originated error carrying only a message.
    pub fn other(message: impl Into<String>) -> Self {
        OctobeError::Other(message.into())
    }

    /// Wrap an arbitrary error so it can travel through handlers.
    pub fn custom<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        OctobeError::Custom(Box::new(err))
    }

    /// Wrap this error with a message while keeping it matchable.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        OctobeError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Kind of this error itself, without looking through wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(feature = "sqlite")]
            OctobeError::SqliteError(rusqlite::Error::QueryReturnedNoRows) => ErrorKind::NotFound,
            #[cfg(feature = "sqlite")]
            OctobeError::SqliteError(
                rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::InvalidColumnIndex(_)
                | rusqlite::Error::InvalidColumnName(_)
                | rusqlite::Error::IntegralValueOutOfRange(..),
            ) => ErrorKind::Scan,
            #[cfg(feature = "sqlite")]
            OctobeError::SqliteError(_) => ErrorKind::Driver,
            #[cfg(feature = "postgres")]
            OctobeError::PostgresError(_) => ErrorKind::Driver,
            OctobeError::ConnectionError(_)
            | OctobeError::ParameterError(_)
            | OctobeError::ExecutionError(_) => ErrorKind::Driver,
            OctobeError::AlreadyExecuted => ErrorKind::AlreadyExecuted,
            OctobeError::NoRows => ErrorKind::NotFound,
            OctobeError::ScanError { .. } => ErrorKind::Scan,
            OctobeError::NotTransactional | OctobeError::TransactionDone(_) => {
                ErrorKind::Transaction
            }
            OctobeError::Cancelled => ErrorKind::Cancelled,
            OctobeError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            OctobeError::ConfigError(_) => ErrorKind::Config,
            OctobeError::Unsupported(_) => ErrorKind::Unsupported,
            OctobeError::Aggregate(_) => ErrorKind::Aggregate,
            OctobeError::Context { source, .. } => source.kind(),
            OctobeError::Custom(_) | OctobeError::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether this error, or any error it wraps or aggregates, is of `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            OctobeError::Aggregate(errs) => errs.is(kind),
            OctobeError::Context { source, .. } => source.is(kind),
            _ => false,
        }
    }

    /// First error of type `E` found in this error, its wrappers, aggregates or source chains.
    #[must_use]
    pub fn find<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        if let Some(found) = (self as &(dyn StdError + 'static)).downcast_ref::<E>() {
            return Some(found);
        }
        match self {
            OctobeError::Aggregate(errs) => errs.find::<E>(),
            OctobeError::Context { source, .. } => source.find::<E>(),
            _ => self.inner().and_then(walk_chain::<E>),
        }
    }

    // Driver and custom variants are transparent, so `source()` skips the wrapped error itself.
    fn inner(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            #[cfg(feature = "sqlite")]
            OctobeError::SqliteError(err) => Some(err),
            #[cfg(feature = "postgres")]
            OctobeError::PostgresError(err) => Some(err),
            OctobeError::Custom(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

fn walk_chain<'a, E>(start: &'a (dyn StdError + 'static)) -> Option<&'a E>
where
    E: StdError + 'static,
{
    let mut current = Some(start);
    while let Some(err) = current {
        if let Some(found) = err.downcast_ref::<E>() {
            return Some(found);
        }
        current = err.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("inventory mismatch")]
    struct InventoryMismatch;

    #[test]
    fn context_keeps_kind() {
        let err = OctobeError::NoRows.context("loading product 3");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is(ErrorKind::NotFound));
        assert_eq!(err.to_string(), "loading product 3: no rows in result set");
    }

    #[test]
    fn find_reaches_custom_errors() {
        let err = OctobeError::custom(InventoryMismatch).context("restock");
        assert!(err.find::<InventoryMismatch>().is_some());
        assert!(err.is(ErrorKind::Other));
        assert!(!err.is(ErrorKind::NotFound));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_no_rows_is_not_found() {
        let err = OctobeError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is(ErrorKind::NotFound));
        assert!(err.find::<rusqlite::Error>().is_some());
    }
}
