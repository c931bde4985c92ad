use tokio_postgres::NoTls;

use super::connection::PostgresConnection;
use crate::error::OctobeError;

/// Options for opening a [`PostgresConnection`].
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: tokio_postgres::Config,
    /// Rewrite `?N` placeholders to `$N`. Off by default: Postgres speaks `$N` natively.
    pub translate_placeholders: bool,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self {
            config,
            translate_placeholders: false,
        }
    }

    /// Parse a `postgres://` URL or `key=value` connection string.
    ///
    /// # Errors
    /// Returns `OctobeError::ConfigError` if the string cannot be parsed.
    pub fn from_url(url: &str) -> Result<Self, OctobeError> {
        let config = url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| OctobeError::ConfigError(format!("invalid connection string: {e}")))?;
        Ok(Self::new(config))
    }

    #[must_use]
    pub fn with_translation(mut self, translate_placeholders: bool) -> Self {
        self.translate_placeholders = translate_placeholders;
        self
    }

    fn validate(&self) -> Result<(), OctobeError> {
        if self.config.get_hosts().is_empty() {
            return Err(OctobeError::ConfigError("host is required".to_string()));
        }
        if self.config.get_dbname().is_none() {
            return Err(OctobeError::ConfigError("dbname is required".to_string()));
        }
        if self.config.get_user().is_none() {
            return Err(OctobeError::ConfigError("user is required".to_string()));
        }
        Ok(())
    }
}

/// Fluent builder for [`PostgresOptions`].
#[derive(Debug, Clone, Default)]
pub struct PostgresOptionsBuilder {
    config: tokio_postgres::Config,
    translate_placeholders: bool,
}

impl PostgresOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.config.host(host);
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port(port);
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: &str) -> Self {
        self.config.dbname(dbname);
        self
    }

    #[must_use]
    pub fn user(mut self, user: &str) -> Self {
        self.config.user(user);
        self
    }

    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.config.password(password);
        self
    }

    #[must_use]
    pub fn translation(mut self, translate_placeholders: bool) -> Self {
        self.translate_placeholders = translate_placeholders;
        self
    }

    #[must_use]
    pub fn finish(self) -> PostgresOptions {
        PostgresOptions::new(self.config).with_translation(self.translate_placeholders)
    }

    /// Connect with the options described by this builder.
    ///
    /// # Errors
    /// Returns `OctobeError::ConfigError` for missing fields or the driver's connect error.
    pub async fn connect(self) -> Result<PostgresConnection, OctobeError> {
        PostgresConnection::connect(self.finish()).await
    }
}

impl PostgresConnection {
    /// Connect without TLS and drive the connection on a background task.
    ///
    /// # Errors
    /// Returns `OctobeError::ConfigError` if host, dbname or user is missing, or
    /// `OctobeError::PostgresError` if connecting fails.
    pub async fn connect(opts: PostgresOptions) -> Result<Self, OctobeError> {
        opts.validate()?;
        let (client, connection) = opts.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection closed with error");
            }
        });
        tracing::debug!(dbname = ?opts.config.get_dbname(), "postgres connection opened");
        Ok(PostgresConnection::from_client(
            client,
            opts.translate_placeholders,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn url_parses_into_options() -> Result<(), OctobeError> {
        let opts = PostgresOptions::from_url("postgres://shop@localhost:5433/inventory")?;
        assert_eq!(opts.config.get_dbname(), Some("inventory"));
        assert_eq!(opts.config.get_ports(), &[5433]);
        assert!(!opts.translate_placeholders);
        assert!(opts.validate().is_ok());
        Ok(())
    }

    #[test]
    fn missing_fields_are_config_errors() {
        let opts = PostgresOptionsBuilder::new().host("localhost").user("shop").finish();
        let err = opts.validate().err();
        assert!(err.is_some_and(|e| e.is(ErrorKind::Config)));
    }

    #[test]
    fn garbage_url_is_config_error() {
        let err = PostgresOptions::from_url("postgres://shop@localhost:notaport/inventory").err();
        assert!(err.is_some_and(|e| e.is(ErrorKind::Config)));
    }
}
