//! Convenient imports for common functionality.

pub use crate::aggregate::Errors;
pub use crate::args;
pub use crate::backend::{Connection, IsolationLevel, Transaction, TxOptions};
pub use crate::context::Context;
pub use crate::driver::Octobe;
pub use crate::error::{ErrorKind, OctobeError};
pub use crate::handler::{HandleOption, Handler, suppress_error};
pub use crate::results::{ExecResult, ResultSet, Row, Rows};
pub use crate::scan::{FromRow, FromValue};
pub use crate::scheme::{Scheme, TxState};
pub use crate::segment::Segment;
pub use crate::types::RowValues;

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresConnection, PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
