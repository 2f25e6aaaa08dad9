//! Failure accumulation for a single fan-out batch.

use crate::error::CompositeFailure;

/// Failures recorded across one batch, kept in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSet<E> {
    failures: Vec<E>,
}

impl<E> Default for FailureSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> FailureSet<E> {
    /// Start an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// Append a failure.
    pub fn record(&mut self, failure: E) {
        self.failures.push(failure);
    }

    /// Number of recorded failures.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether the batch has recorded no failures.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Iterate over the recorded failures in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.failures.iter()
    }

    /// Reduce the set into the batch outcome.
    ///
    /// An empty set is success. Otherwise the headline is built from the first
    /// failure that arrived and every recorded failure is kept as a cause.
    ///
    /// # Errors
    ///
    /// Returns a [`CompositeFailure`] when at least one failure was recorded.
    pub fn reduce<M>(self, headline: M) -> Result<(), CompositeFailure<E>>
    where
        M: FnOnce(&E) -> String,
    {
        let Some(first) = self.failures.first() else {
            return Ok(());
        };
        let message = headline(first);
        Err(CompositeFailure::new(message, self.failures))
    }
}

impl<E> Extend<E> for FailureSet<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.failures.extend(iter);
    }
}

impl<E> FromIterator<E> for FailureSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            failures: iter.into_iter().collect(),
        }
    }
}

impl<'a, E> IntoIterator for &'a FailureSet<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E> IntoIterator for FailureSet<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}
