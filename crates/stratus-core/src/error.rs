//! Error types shared by every Stratus crate.

use thiserror::Error;

/// Result type alias for Stratus operations.
pub type StratusResult<T> = Result<T, StratusError>;

/// Errors surfaced by the lifecycle layer.
///
/// `InvalidArgument` and `InvalidKey` are raised before any provider call
/// is made. Only `Transient` is eligible for retry.
#[derive(Debug, Error)]
pub enum StratusError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid tenant key: {0}")]
    InvalidKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient provider error in {operation}: {message}")]
    Transient { operation: String, message: String },

    #[error("provider rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    #[error("convergence failed: {0}")]
    Convergence(String),

    #[error("{label} failed: {source}")]
    PartialFailure {
        label: String,
        #[source]
        source: Box<StratusError>,
    },

    #[error("{label} gave up after {attempts} attempts: {source}")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<StratusError>,
    },

    #[error("{label} cancelled")]
    Cancelled { label: String },
}

impl StratusError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Wrap this error as the failed member of a fan-out set.
    pub fn within(self, label: impl Into<String>) -> Self {
        Self::PartialFailure {
            label: label.into(),
            source: Box::new(self),
        }
    }

    /// Whether the retry helper may re-issue the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// The innermost error, skipping fan-out and retry annotations.
    pub fn root(&self) -> &StratusError {
        match self {
            Self::PartialFailure { source, .. } | Self::Exhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(StratusError::transient("create_tags", "throttled").is_retryable());
        assert!(!StratusError::invalid("missing name").is_retryable());
        assert!(!StratusError::rejected("delete_service", "in use").is_retryable());
        assert!(!StratusError::Convergence("gone".into()).is_retryable());
    }

    #[test]
    fn root_unwraps_annotations() {
        let err = StratusError::transient("create_tags", "404")
            .within("tag vpc-1");
        let err = StratusError::Exhausted {
            label: "tag vpc-1".into(),
            attempts: 3,
            source: Box::new(err),
        };
        assert!(matches!(err.root(), StratusError::Transient { .. }));
        assert!(err.to_string().contains("gave up after 3 attempts"));
    }
}
