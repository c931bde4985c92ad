use std::error::Error as StdError;
use std::fmt;

use crate::error::{ErrorKind, OctobeError};

/// Ordered collection of errors reported as one.
///
/// Produced when a rollback triggered by an error fails as well, so neither failure is
/// discarded. Matching delegates to every element:
///
/// ```rust
/// use octobe::prelude::*;
///
/// let errs: Errors = vec![
///     OctobeError::other("stock went negative"),
///     OctobeError::NoRows,
/// ]
/// .into_iter()
/// .collect();
///
/// assert!(errs.is(ErrorKind::NotFound));
/// assert_eq!(errs.to_string(), "stock went negative. no rows in result set.");
/// ```
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<OctobeError>,
}

impl Errors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: OctobeError) {
        self.errors.push(err);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OctobeError> {
        self.errors.iter()
    }

    /// True if any contained error matches `kind`.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|err| err.is(kind))
    }

    /// First contained error that is, or wraps, an `E`.
    #[must_use]
    pub fn find<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.errors.iter().find_map(OctobeError::find::<E>)
    }

    /// `Ok(())` when empty, the single error when there is one, the aggregate otherwise.
    ///
    /// # Errors
    /// Returns the collected error(s) when the collection is not empty.
    pub fn into_result(mut self) -> Result<(), OctobeError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(OctobeError::Aggregate(self)),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<OctobeError> {
        self.errors
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{err}.")?;
        }
        Ok(())
    }
}

impl StdError for Errors {}

impl From<Vec<OctobeError>> for Errors {
    fn from(errors: Vec<OctobeError>) -> Self {
        Self { errors }
    }
}

impl FromIterator<OctobeError> for Errors {
    fn from_iter<I: IntoIterator<Item = OctobeError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Errors {
    type Item = OctobeError;
    type IntoIter = std::vec::IntoIter<OctobeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a OctobeError;
    type IntoIter = std::slice::Iter<'a, OctobeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
