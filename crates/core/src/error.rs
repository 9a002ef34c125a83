//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// consistency, missing state). Infrastructure concerns belong elsewhere.
/// None of these are retried: callers fix the input and re-submit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (bad campaign kind, missing name, duplicate
    /// priority, invalid filename, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant would be violated by the operation.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Required state is missing (no enabled base campaign, unknown id, ...).
    #[error("not found: {0}")]
    NotFound(String),

    /// A temporary campaign references SKUs that the base campaign does not
    /// carry. The whole batch is rejected.
    #[error("skus not found in base campaign: {}", skus.join(","))]
    Consistency { skus: Vec<String> },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a consistency error; SKUs are sorted and de-duplicated so the
    /// report is stable.
    pub fn unknown_skus(skus: impl IntoIterator<Item = String>) -> Self {
        let mut skus: Vec<String> = skus.into_iter().collect();
        skus.sort();
        skus.dedup();
        Self::Consistency { skus }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_skus_are_sorted_and_deduplicated() {
        let err = DomainError::unknown_skus(vec!["B".to_string(), "A".to_string(), "B".to_string()]);
        assert_eq!(
            err,
            DomainError::Consistency {
                skus: vec!["A".to_string(), "B".to_string()]
            }
        );
        assert_eq!(err.to_string(), "skus not found in base campaign: A,B");
    }
}
