#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use octobe::prelude::*;

/// Everything a scheme asked the mock driver to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute(String, Vec<RowValues>),
    Query(String, Vec<RowValues>),
    Begin(TxOptions),
    Commit,
    Rollback,
    Interrupt,
}

/// Failure and latency switches for the mock driver.
#[derive(Debug, Default)]
pub struct Script {
    pub fail_begin: bool,
    pub fail_execute: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub latency: Option<Duration>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<RowValues>>,
}

#[derive(Clone, Default)]
struct Shared {
    calls: Arc<Mutex<Vec<Call>>>,
    script: Arc<Mutex<Script>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    async fn pause(&self) {
        let latency = lock(&self.script).latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        self.record(Call::Execute(sql.to_owned(), args.to_vec()));
        self.pause().await;
        if lock(&self.script).fail_execute {
            return Err(OctobeError::ExecutionError("mock execute failed".into()));
        }
        Ok(ExecResult::new(1, None))
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.record(Call::Query(sql.to_owned(), args.to_vec()));
        self.pause().await;
        let script = lock(&self.script);
        let mut rs = ResultSet::with_capacity(script.columns.clone(), script.rows.len());
        for row in &script.rows {
            rs.add_row_values(row.clone());
        }
        Ok(rs)
    }
}

/// Connection that records calls instead of talking to a database.
#[derive(Clone, Default)]
pub struct MockConnection {
    shared: Shared,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.shared.calls).clone()
    }

    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut lock(&self.shared.script));
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Transaction = MockTransaction;

    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        self.shared.execute(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.shared.query(sql, args).await
    }

    async fn begin(&self, options: TxOptions) -> Result<MockTransaction, OctobeError> {
        self.shared.record(Call::Begin(options));
        self.shared.pause().await;
        if lock(&self.shared.script).fail_begin {
            return Err(OctobeError::ConnectionError("mock begin failed".into()));
        }
        Ok(MockTransaction {
            shared: self.shared.clone(),
        })
    }

    fn interrupt(&self) {
        self.shared.record(Call::Interrupt);
    }
}

pub struct MockTransaction {
    shared: Shared,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn execute(&self, sql: &str, args: &[RowValues]) -> Result<ExecResult, OctobeError> {
        self.shared.execute(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<ResultSet, OctobeError> {
        self.shared.query(sql, args).await
    }

    async fn commit(&self) -> Result<(), OctobeError> {
        self.shared.record(Call::Commit);
        if lock(&self.shared.script).fail_commit {
            return Err(OctobeError::ExecutionError("mock commit failed".into()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), OctobeError> {
        self.shared.record(Call::Rollback);
        if lock(&self.shared.script).fail_rollback {
            return Err(OctobeError::ExecutionError("mock rollback failed".into()));
        }
        Ok(())
    }

    fn interrupt(&self) {
        self.shared.record(Call::Interrupt);
    }
}

/// A caller-side error used to check that errors travel through unchanged.
#[derive(Debug, thiserror::Error)]
#[error("out of stock: {0}")]
pub struct OutOfStock(pub String);

#[cfg(feature = "sqlite")]
pub async fn sqlite_shop() -> Result<Octobe<SqliteConnection>, OctobeError> {
    let conn = SqliteOptionsBuilder::new(":memory:".to_string())
        .connect()
        .await?;
    conn.execute_batch(
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            price REAL,
            stock INTEGER NOT NULL DEFAULT 0
        );",
    )
    .await?;
    Ok(Octobe::new(conn))
}

#[cfg(feature = "sqlite")]
pub async fn count_products(db: &Octobe<SqliteConnection>) -> Result<i64, OctobeError> {
    let scheme = db.begin(Context::background());
    let (count,) = scheme
        .segment("SELECT COUNT(*) FROM products")
        .query_row::<(i64,)>()
        .await?;
    Ok(count)
}
