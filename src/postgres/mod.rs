// Postgres backend built on tokio-postgres.
//
// - config: options, builder and connecting
// - connection: autocommit statements and transaction start
// - transaction: statements inside BEGIN ... COMMIT/ROLLBACK
// - params: `ToSql` for middleware values
// - query: result extraction

pub mod config;
pub mod connection;
pub mod params;
pub mod query;
pub mod transaction;

pub use config::{PostgresOptions, PostgresOptionsBuilder};
pub use connection::PostgresConnection;
pub use params::Params;
pub use query::{build_result_set, postgres_extract_value};
pub use transaction::PostgresTransaction;
