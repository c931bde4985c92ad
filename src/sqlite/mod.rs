// SQLite backend built on rusqlite.
//
// - config: options, builder and connecting
// - connection: autocommit statements and transaction start
// - transaction: statements inside BEGIN ... COMMIT/ROLLBACK
// - params: argument conversion into rusqlite values
// - query: result extraction

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod transaction;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use params::Params;
pub use query::{build_limited_result_set, build_result_set};
pub use transaction::SqliteTransaction;
