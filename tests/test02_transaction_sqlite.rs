#![cfg(feature = "sqlite")]

mod common;

use common::{count_products, sqlite_shop};
use octobe::prelude::*;

async fn insert(scheme: &Scheme<SqliteConnection>, name: &str) -> Result<(), OctobeError> {
    let mut seg = scheme.segment("INSERT INTO products(name) VALUES ($1)");
    seg.arguments(args![name]);
    seg.exec().await?;
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn commit_persists_and_ends_the_transaction() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    assert!(scheme.is_transactional());
    assert_eq!(scheme.state(), Some(TxState::Active));

    insert(&scheme, "mirror").await?;
    insert(&scheme, "lamp").await?;
    scheme.commit().await?;
    assert_eq!(scheme.state(), Some(TxState::Committed));
    assert_eq!(count_products(&db).await?, 2);

    let again = scheme.commit().await;
    assert!(matches!(again, Err(OctobeError::TransactionDone("committed"))));
    let rollback = scheme.rollback().await;
    assert!(rollback.is_err_and(|e| e.is(ErrorKind::Transaction)));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn rollback_discards_work() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    insert(&scheme, "mirror").await?;
    scheme.rollback().await?;
    assert_eq!(scheme.state(), Some(TxState::RolledBack));
    assert_eq!(count_products(&db).await?, 0);

    let commit = scheme.commit().await;
    assert!(matches!(commit, Err(OctobeError::TransactionDone("rolled back"))));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn segments_after_commit_fail() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    scheme.commit().await?;

    let res = insert(&scheme, "mirror").await;
    assert!(res.is_err_and(|e| e.is(ErrorKind::Transaction)));
    assert_eq!(count_products(&db).await?, 0);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn plain_scheme_has_no_transaction() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin(Context::background());
    assert!(!scheme.is_transactional());
    assert_eq!(scheme.state(), None);

    insert(&scheme, "mirror").await?;
    assert_eq!(count_products(&db).await?, 1);
    assert!(matches!(scheme.commit().await, Err(OctobeError::NotTransactional)));
    assert!(matches!(scheme.rollback().await, Err(OctobeError::NotTransactional)));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn dropped_scheme_rolls_back() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    {
        let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
        insert(&scheme, "mirror").await?;
    }
    // the autocommit count waits for the background rollback to release the connection
    assert_eq!(count_products(&db).await?, 0);

    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    insert(&scheme, "lamp").await?;
    scheme.commit().await?;
    assert_eq!(count_products(&db).await?, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn read_only_transaction_rejects_writes() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let options = TxOptions::new()
        .isolation(IsolationLevel::Serializable)
        .read_only(true);
    let scheme = db.begin_tx(Context::background(), options).await?;
    let res = insert(&scheme, "mirror").await;
    assert!(res.is_err_and(|e| e.is(ErrorKind::Driver)));
    scheme.rollback().await?;

    // query_only is reset once the transaction ends
    insert(&db.begin(Context::background()), "lamp").await?;
    assert_eq!(count_products(&db).await?, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn read_only_linearizable_transaction_reads() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    insert(&db.begin(Context::background()), "mirror").await?;

    let options = TxOptions::new()
        .isolation(IsolationLevel::Linearizable)
        .read_only(true);
    let scheme = db.begin_tx(Context::background(), options).await?;
    let (name,) = scheme
        .segment("SELECT name FROM products")
        .query_row::<(String,)>()
        .await?;
    assert_eq!(name, "mirror");
    scheme.commit().await?;
    assert_eq!(scheme.state(), Some(TxState::Committed));

    insert(&db.begin(Context::background()), "lamp").await?;
    assert_eq!(count_products(&db).await?, 2);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn dropped_read_only_transaction_restores_writes() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let options = TxOptions::new()
        .isolation(IsolationLevel::Serializable)
        .read_only(true);
    let tx = db.connection().begin(options).await?;
    assert!(tx.is_open());
    drop(tx);

    // waits on the session gate until the rollback has run
    insert(&db.begin(Context::background()), "lamp").await?;
    assert_eq!(count_products(&db).await?, 1);
    let autocommit = db
        .connection()
        .with_connection(|conn| Ok(conn.is_autocommit()))
        .await?;
    assert!(autocommit);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn autocommit_waits_for_the_open_transaction() -> Result<(), OctobeError> {
    let db = sqlite_shop().await?;
    let scheme = db.begin_tx(Context::background(), TxOptions::default()).await?;
    insert(&scheme, "mirror").await?;

    let outside = db.clone();
    let counter = tokio::spawn(async move { count_products(&outside).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!counter.is_finished());

    scheme.commit().await?;
    let seen = counter
        .await
        .map_err(|e| OctobeError::other(format!("join error: {e}")))??;
    assert_eq!(seen, 1);
    Ok(())
}
