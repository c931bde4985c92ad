//! Transaction-scoped SQL sessions with one-shot statements.
//!
//! [`Octobe`] wraps an open connection. [`Octobe::begin`] and [`Octobe::begin_tx`] return a
//! [`Scheme`], which issues [`Segment`]s (single statements, executed at most once), runs
//! [`Handler`]s and owns the transaction lifecycle including
//! [`Scheme::watch_rollback`]. Multiple failures are collected in [`Errors`].
//!
//! Drivers plug in through the [`Connection`] and [`Transaction`] traits. SQLite
//! (`rusqlite`) and Postgres (`tokio-postgres`) drivers ship behind the `sqlite` and `postgres`
//! features.

pub mod aggregate;
pub mod backend;
pub mod context;
pub mod driver;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod results;
pub mod scan;
pub mod scheme;
pub mod segment;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use aggregate::Errors;
pub use backend::{Connection, IsolationLevel, Transaction, TxOptions};
pub use context::Context;
pub use driver::Octobe;
pub use error::{ErrorKind, OctobeError};
pub use handler::{HandleOption, Handler, suppress_error};
pub use results::{ColumnIndex, ExecResult, ResultSet, Row, Rows};
pub use scan::{FromRow, FromValue};
pub use scheme::{Scheme, TxState};
pub use segment::Segment;
pub use translation::{PlaceholderStyle, translate_placeholders};
pub use types::RowValues;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnection, PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
