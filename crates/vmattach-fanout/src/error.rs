//! Composite failure produced when a batch records one or more failures.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// One headline failure wrapping every cause recorded in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeFailure<E> {
    message: String,
    causes: Vec<E>,
}

impl<E> CompositeFailure<E> {
    /// Build a composite failure from a headline and its causes.
    #[must_use]
    pub const fn new(message: String, causes: Vec<E>) -> Self {
        Self { message, causes }
    }

    /// Headline message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Every recorded cause, in arrival order.
    #[must_use]
    pub fn causes(&self) -> &[E] {
        &self.causes
    }

    /// Cause the headline was built from.
    #[must_use]
    pub fn primary(&self) -> Option<&E> {
        self.causes.first()
    }

    /// Consume the failure, returning the causes.
    #[must_use]
    pub fn into_causes(self) -> Vec<E> {
        self.causes
    }
}

impl<E> Display for CompositeFailure<E> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl<E> Error for CompositeFailure<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.causes.first().map(|cause| cause as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn display_uses_headline_and_source_is_primary_cause() {
        let failure = CompositeFailure::new(
            "batch failed".to_string(),
            vec![io::Error::other("first"), io::Error::other("second")],
        );
        assert_eq!(failure.to_string(), "batch failed");
        assert_eq!(
            failure.source().map(ToString::to_string),
            Some("first".to_string())
        );
        assert_eq!(failure.causes().len(), 2);
        assert_eq!(
            failure.primary().map(ToString::to_string),
            Some("first".to_string())
        );
        assert_eq!(failure.into_causes().len(), 2);
    }
}
