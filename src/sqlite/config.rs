use std::time::Duration;

use super::connection::SqliteConnection;
use crate::error::OctobeError;

/// Options for opening a [`SqliteConnection`].
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// File path, `:memory:`, or a `file:` URI.
    pub db_path: String,
    /// Rewrite `$N` placeholders to `?N`. On by default so arguments bind by number.
    pub translate_placeholders: bool,
    pub busy_timeout: Option<Duration>,
    /// Switch the journal to WAL after opening (ignored by in-memory databases).
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            translate_placeholders: true,
            busy_timeout: Some(Duration::from_secs(5)),
            wal: false,
        }
    }

    #[must_use]
    pub fn with_translation(mut self, translate_placeholders: bool) -> Self {
        self.translate_placeholders = translate_placeholders;
        self
    }
}

/// Fluent builder for [`SqliteOptions`].
///
/// ```rust,no_run
/// use octobe::prelude::*;
///
/// # async fn demo() -> Result<(), OctobeError> {
/// let conn = SqliteOptionsBuilder::new("shop.db".into())
///     .wal(true)
///     .busy_timeout(std::time::Duration::from_secs(2))
///     .connect()
///     .await?;
/// let db = Octobe::new(conn);
/// # let _ = db;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn translation(mut self, translate_placeholders: bool) -> Self {
        self.opts.translate_placeholders = translate_placeholders;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the connection described by this builder.
    ///
    /// # Errors
    /// Returns `OctobeError` if the database cannot be opened or configured.
    pub async fn connect(self) -> Result<SqliteConnection, OctobeError> {
        SqliteConnection::connect(self.finish()).await
    }
}

impl SqliteConnection {
    /// Open a connection with the given options.
    ///
    /// # Errors
    /// Returns `OctobeError::ConfigError` for an empty path, or `OctobeError::SqliteError` if
    /// opening or applying pragmas fails.
    pub async fn connect(opts: SqliteOptions) -> Result<Self, OctobeError> {
        if opts.db_path.is_empty() {
            return Err(OctobeError::ConfigError("db_path is required".to_string()));
        }
        let translate = opts.translate_placeholders;
        let conn = tokio::task::spawn_blocking(move || open(&opts))
            .await
            .map_err(|e| {
                OctobeError::ConnectionError(format!("sqlite open join error: {e}"))
            })??;
        Ok(SqliteConnection::from_rusqlite(conn, translate))
    }
}

fn open(opts: &SqliteOptions) -> Result<rusqlite::Connection, OctobeError> {
    let conn = rusqlite::Connection::open(&opts.db_path)?;
    if let Some(timeout) = opts.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    if opts.wal {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    tracing::debug!(db_path = %opts.db_path, wal = opts.wal, "sqlite connection opened");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builder_defaults() {
        let opts = SqliteOptionsBuilder::new(":memory:".into()).finish();
        assert!(opts.translate_placeholders);
        assert!(!opts.wal);
        assert_eq!(opts.busy_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_path_is_config_error() {
        let err = SqliteConnection::connect(SqliteOptions::new(String::new()))
            .await
            .err();
        assert!(err.is_some_and(|e| e.is(ErrorKind::Config)));
    }
}
