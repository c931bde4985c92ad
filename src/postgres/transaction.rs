use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use tokio_postgres::{CancelToken, Client};

use super::connection::{cancel_in_background, execute_on, query_first_on, query_on};
use crate::backend::Transaction;
use crate::error::OctobeError;
use crate::results::{ExecResult, ResultSet};
use crate::types::RowValues;

/// An open Postgres transaction on a shared client.
pub struct PostgresTransaction {
    client: Arc<Client>,
    gate: Mutex<Option<OwnedMutexGuard<()>>>,
    cancel: CancelToken,
    translate_placeholders: bool,
}

impl PostgresTransaction {
    pub(crate) fn new(
        client: Arc<Client>,
        gate: OwnedMutexGuard<()>,
        cancel: CancelToken,
        translate_placeholders: bool,
    ) -> Self {
        Self {
            client,
            gate: Mutex::new(Some(gate)),
            cancel,
            translate_placeholders,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn ensure_open(&self) -> Result<(), OctobeError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(OctobeError::ExecutionError(
                "Postgres transaction already completed".into(),
            ))
        }
    }

    async fn finish(&self, statement: &str) -> Result<(), OctobeError> {
        self.ensure_open()?;
        self.client.batch_execute(statement).await?;
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

impl fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresTransaction")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        self.ensure_open()?;
        execute_on(&self.client, sql, args, self.translate_placeholders).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.ensure_open()?;
        query_on(&self.client, sql, args, self.translate_placeholders).await
    }

    async fn query_first(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.ensure_open()?;
        query_first_on(&self.client, sql, args, self.translate_placeholders).await
    }

    async fn commit(&self) -> Result<(), OctobeError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), OctobeError> {
        self.finish("ROLLBACK").await
    }

    fn interrupt(&self) {
        cancel_in_background(&self.cancel);
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        let Some(gate) = self
            .gate
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let client = Arc::clone(&self.client);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = client.batch_execute("ROLLBACK").await {
                        tracing::warn!(error = %err, "postgres rollback on drop failed");
                    }
                    drop(gate);
                });
            }
            Err(_) => tracing::warn!("no tokio runtime; open postgres transaction dropped without rollback"),
        }
    }
}
