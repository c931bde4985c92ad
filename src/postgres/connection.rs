use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{TryStreamExt, pin_mut};
use tokio::sync::Mutex;
use tokio_postgres::{CancelToken, Client, NoTls};

use super::params::Params;
use super::query::build_result_set;
use super::transaction::PostgresTransaction;
use crate::backend::{Connection, IsolationLevel, TxOptions};
use crate::error::OctobeError;
use crate::results::{ExecResult, ResultSet};
use crate::translation::{PlaceholderStyle, translate_placeholders};
use crate::types::RowValues;

/// A single tokio-postgres client.
///
/// Transactions are opened with `BEGIN` on this client and hold its session gate until they
/// end, so autocommit statements from other schemes wait instead of joining them.
pub struct PostgresConnection {
    client: Arc<Client>,
    gate: Arc<Mutex<()>>,
    cancel: CancelToken,
    translate_placeholders: bool,
}

impl PostgresConnection {
    /// Wrap a connected client. Its connection future must already be driven elsewhere.
    #[must_use]
    pub fn from_client(client: Client, translate_placeholders: bool) -> Self {
        let cancel = client.cancel_token();
        Self {
            client: Arc::new(client),
            gate: Arc::new(Mutex::new(())),
            cancel,
            translate_placeholders,
        }
    }

    /// Run several `;`-separated statements without arguments, e.g. schema setup.
    ///
    /// # Errors
    /// Returns `OctobeError::PostgresError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), OctobeError> {
        let _gate = self.gate.lock().await;
        self.client.batch_execute(sql).await?;
        Ok(())
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("closed", &self.client.is_closed())
            .field("translate_placeholders", &self.translate_placeholders)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    type Transaction = PostgresTransaction;

    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        let _gate = self.gate.lock().await;
        execute_on(&self.client, sql, args, self.translate_placeholders).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        let _gate = self.gate.lock().await;
        query_on(&self.client, sql, args, self.translate_placeholders).await
    }

    async fn query_first(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        let _gate = self.gate.lock().await;
        query_first_on(&self.client, sql, args, self.translate_placeholders).await
    }

    async fn begin(&self, options: TxOptions) -> Result<PostgresTransaction, OctobeError> {
        let statement = begin_statement(options)?;
        let gate = Arc::clone(&self.gate).lock_owned().await;
        self.client.batch_execute(&statement).await?;
        tracing::debug!(%statement, "postgres transaction started");
        Ok(PostgresTransaction::new(
            Arc::clone(&self.client),
            gate,
            self.cancel.clone(),
            self.translate_placeholders,
        ))
    }

    fn interrupt(&self) {
        cancel_in_background(&self.cancel);
    }
}

pub(crate) fn begin_statement(options: TxOptions) -> Result<String, OctobeError> {
    let mut statement = String::from("BEGIN");
    match options.isolation {
        IsolationLevel::Default => {}
        level @ (IsolationLevel::ReadUncommitted
        | IsolationLevel::ReadCommitted
        | IsolationLevel::RepeatableRead
        | IsolationLevel::Serializable) => {
            statement.push_str(" ISOLATION LEVEL ");
            statement.push_str(&level.to_string());
        }
        level => {
            return Err(OctobeError::Unsupported(format!(
                "postgres does not support isolation level {level}"
            )));
        }
    }
    if options.read_only {
        statement.push_str(" READ ONLY");
    }
    Ok(statement)
}

fn prepare_sql(sql: &str, translate: bool) -> Cow<'_, str> {
    if translate {
        translate_placeholders(sql, PlaceholderStyle::Postgres)
    } else {
        Cow::Borrowed(sql)
    }
}

pub(crate) async fn execute_on(
    client: &Client,
    sql: &str,
    args: &[RowValues],
    translate: bool,
) -> Result<ExecResult, OctobeError> {
    let sql = prepare_sql(sql, translate);
    let params = Params::convert(args);
    let rows = client.execute(&*sql, params.as_refs()).await?;
    Ok(ExecResult::new(rows, None))
}

pub(crate) async fn query_on(
    client: &Client,
    sql: &str,
    args: &[RowValues],
    translate: bool,
) -> Result<ResultSet, OctobeError> {
    let sql = prepare_sql(sql, translate);
    let params = Params::convert(args);
    let stmt = client.prepare(&sql).await?;
    let rows = client.query(&stmt, params.as_refs()).await?;
    build_result_set(&stmt, &rows)
}

/// Reads rows from a portal stream and stops after the first one.
pub(crate) async fn query_first_on(
    client: &Client,
    sql: &str,
    args: &[RowValues],
    translate: bool,
) -> Result<ResultSet, OctobeError> {
    let sql = prepare_sql(sql, translate);
    let params = Params::convert(args);
    let stmt = client.prepare(&sql).await?;
    let stream = client
        .query_raw(&stmt, params.as_refs().iter().copied())
        .await?;
    pin_mut!(stream);
    let first = stream.try_next().await?;
    build_result_set(&stmt, first.as_slice())
}

pub(crate) fn cancel_in_background(token: &CancelToken) {
    let token = token.clone();
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            if let Err(err) = token.cancel_query(NoTls).await {
                tracing::warn!(error = %err, "postgres cancel request failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn begin_statement_variants() -> Result<(), OctobeError> {
        assert_eq!(begin_statement(TxOptions::default())?, "BEGIN");
        assert_eq!(
            begin_statement(
                TxOptions::new()
                    .isolation(IsolationLevel::Serializable)
                    .read_only(true)
            )?,
            "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY"
        );
        let err = begin_statement(TxOptions::new().isolation(IsolationLevel::Snapshot)).err();
        assert!(err.is_some_and(|e| e.is(ErrorKind::Unsupported)));
        Ok(())
    }

    #[test]
    fn translation_rewrites_question_marks() {
        assert_eq!(prepare_sql("SELECT ?1", true), "SELECT $1");
        assert_eq!(prepare_sql("SELECT ?1", false), "SELECT ?1");
    }
}
