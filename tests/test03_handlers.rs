#![cfg(feature = "sqlite")]

mod common;

use common::{OutOfStock, sqlite_shop};
use octobe::prelude::*;

async fn add_product(scheme: &Scheme<SqliteConnection>) -> Result<i64, OctobeError> {
    let mut seg = scheme.segment("INSERT INTO products(name, stock) VALUES ($1, $2) RETURNING id");
    seg.arguments(args!["mirror", 2]);
    let (id,) = seg.query_row::<(i64,)>().await?;
    Ok(id)
}

async fn missing_product(scheme: &Scheme<SqliteConnection>) -> Result<String, OctobeError> {
    let mut seg = scheme.segment("SELECT name FROM products WHERE id = $1");
    seg.arguments(args![404]);
    let (name,) = seg.query_row::<(String,)>().await?;
    Ok(name)
}

/// Takes stock out of a product; fails when there is not enough left.
struct Withdraw {
    id: i64,
    amount: i64,
}

impl Handler<SqliteConnection> for Withdraw {
    type Output = i64;

    async fn handle(self, scheme: &Scheme<SqliteConnection>) -> Result<i64, OctobeError> {
        let mut seg = scheme.segment("SELECT name, stock FROM products WHERE id = $1");
        seg.arguments(args![self.id]);
        let (name, stock) = seg.query_row::<(String, i64)>().await?;
        if stock < self.amount {
            return Err(OctobeError::custom(OutOfStock(name)));
        }

        let mut seg = scheme.segment("UPDATE products SET stock = stock - $2 WHERE id = $1");
        seg.arguments(args![self.id, self.amount]);
        seg.exec().await?;
        Ok(stock - self.amount)
    }
}

#[tokio::test(flavor = "current_thread")]
async fn async_fn_handler_returns_its_value() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    let id = scheme.handle(add_product, &[]).await?;
    assert_eq!(id, Some(1));
    scheme.commit().await
}

#[tokio::test(flavor = "current_thread")]
async fn closure_handler_writes_through_captures() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin(Context::background());
    scheme.handle(add_product, &[]).await?;

    let mut names: Vec<String> = Vec::new();
    let lister = async |scheme: &Scheme<SqliteConnection>| -> Result<(), OctobeError> {
        let mut seg = scheme.segment("SELECT name FROM products ORDER BY id");
        names = seg
            .query(|rows| {
                rows.map(|row| row.get::<String>("name"))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await?;
        Ok(())
    };
    scheme.handle(lister, &[]).await?;
    assert_eq!(names, ["mirror"]);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn suppressed_error_yields_none() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin(Context::background());

    let found = scheme
        .handle(missing_product, &[suppress_error(ErrorKind::NotFound)])
        .await?;
    assert_eq!(found, None);

    let err = scheme
        .handle(missing_product, &[suppress_error(ErrorKind::Scan)])
        .await
        .expect_err("NotFound is not suppressed by a Scan option");
    assert!(err.is(ErrorKind::NotFound));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn suppressed_lookup_inside_transaction_still_commits() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    db.begin(Context::background()).handle(add_product, &[]).await?;

    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    let mut seg = scheme.segment("UPDATE products SET stock = $2 WHERE id = $1");
    seg.arguments(args![1, 7]);
    assert_eq!(seg.exec().await?.rows_affected()?, 1);

    let found = scheme
        .handle(missing_product, &[suppress_error(ErrorKind::NotFound)])
        .await?;
    assert_eq!(found, None);
    assert_eq!(scheme.state(), Some(TxState::Active));

    scheme.commit().await?;
    assert_eq!(scheme.state(), Some(TxState::Committed));

    let (stock,) = db
        .begin(Context::background())
        .segment("SELECT stock FROM products WHERE id = 1")
        .query_row::<(i64,)>()
        .await?;
    assert_eq!(stock, 7);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn struct_handler_error_is_findable() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    scheme.handle(add_product, &[]).await?;

    let left = scheme.handle(Withdraw { id: 1, amount: 1 }, &[]).await?;
    assert_eq!(left, Some(1));

    let err = scheme
        .handle(Withdraw { id: 1, amount: 5 }, &[])
        .await
        .expect_err("only one left in stock");
    assert_eq!(err.kind(), ErrorKind::Other);
    assert_eq!(err.find::<OutOfStock>().map(|e| e.0.as_str()), Some("mirror"));

    let skipped = scheme
        .handle(
            Withdraw { id: 1, amount: 5 },
            &[HandleOption::suppress_if(|e| e.find::<OutOfStock>().is_some())],
        )
        .await?;
    assert_eq!(skipped, None);
    scheme.commit().await
}
