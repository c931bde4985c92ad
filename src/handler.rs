use std::fmt;
use std::future::Future;

use crate::backend::Connection;
use crate::error::{ErrorKind, OctobeError};
use crate::scheme::Scheme;

/// A reusable unit of work run against a scheme by [`Scheme::handle`].
///
/// Async closures and `async fn`s taking `&Scheme<C>` are handlers already. Results flow back
/// through the return value, or through `&mut` references the handler was built with:
///
/// ```rust,no_run
/// use octobe::prelude::*;
///
/// async fn insert_mirror(scheme: &Scheme<SqliteConnection>) -> Result<i64, OctobeError> {
///     let mut seg = scheme.segment("INSERT INTO products(name) VALUES ($1) RETURNING id");
///     seg.arguments(args!["mirror"]);
///     let (id,) = seg.query_row::<(i64,)>().await?;
///     Ok(id)
/// }
///
/// # async fn demo(scheme: &Scheme<SqliteConnection>) -> Result<(), OctobeError> {
/// let id = scheme.handle(insert_mirror, &[]).await?;
///
/// let mut names: Vec<String> = Vec::new();
/// let list = async |scheme: &Scheme<SqliteConnection>| -> Result<(), OctobeError> {
///     names = scheme
///         .segment("SELECT name FROM products")
///         .query(|rows| rows.map(|row| row.get::<String>("name")).collect())
///         .await?;
///     Ok(())
/// };
/// scheme.handle(list, &[]).await?;
/// # let _ = (id, names);
/// # Ok(()) }
/// ```
pub trait Handler<C: Connection> {
    type Output;

    fn handle(self, scheme: &Scheme<C>)
    -> impl Future<Output = Result<Self::Output, OctobeError>>;
}

impl<C, F, T> Handler<C> for F
where
    C: Connection,
    F: AsyncFnOnce(&Scheme<C>) -> Result<T, OctobeError>,
{
    type Output = T;

    fn handle(self, scheme: &Scheme<C>) -> impl Future<Output = Result<T, OctobeError>> {
        self(scheme)
    }
}

type Predicate = Box<dyn Fn(&OctobeError) -> bool + Send + Sync>;

enum Suppression {
    Kind(ErrorKind),
    When(Predicate),
}

/// Option recognised by [`Scheme::handle`].
pub struct HandleOption {
    suppression: Suppression,
}

impl HandleOption {
    /// Suppress handler errors for which `predicate` returns true.
    pub fn suppress_if<P>(predicate: P) -> Self
    where
        P: Fn(&OctobeError) -> bool + Send + Sync + 'static,
    {
        Self {
            suppression: Suppression::When(Box::new(predicate)),
        }
    }

    pub(crate) fn suppresses(&self, err: &OctobeError) -> bool {
        match &self.suppression {
            Suppression::Kind(kind) => err.is(*kind),
            Suppression::When(predicate) => predicate(err),
        }
    }
}

impl fmt::Debug for HandleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suppression {
            Suppression::Kind(kind) => f.debug_tuple("SuppressError").field(kind).finish(),
            Suppression::When(_) => f.write_str("SuppressIf(..)"),
        }
    }
}

/// Make `Scheme::handle` return `Ok(None)` when the handler fails with an error of `kind`,
/// including errors wrapped with context or collected in an aggregate.
#[must_use]
pub fn suppress_error(kind: ErrorKind) -> HandleOption {
    HandleOption {
        suppression: Suppression::Kind(kind),
    }
}
