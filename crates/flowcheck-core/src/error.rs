//! Error types for CFG construction and dataflow analysis

use thiserror::Error;

/// Errors surfaced by the dataflow engine and its caches
#[derive(Debug, Clone, Error)]
pub enum DataflowError {
    /// A type or symbol named by the fragment could not be resolved in the
    /// program environment. Never cached; a later query retries the build.
    #[error("cannot resolve symbol `{symbol}`")]
    CompletionFailure { symbol: String },

    /// The worklist did not drain within the configured visit ceiling
    #[error("dataflow analysis of {fragment} did not converge after {visits} node visits (limit {limit})")]
    NonConvergent {
        fragment: String,
        visits: usize,
        limit: usize,
    },

    /// `value_of` was asked about a position that is not an expression
    #[error("expected an expression, found {kind}")]
    NotAnExpression { kind: &'static str },

    #[error("internal dataflow error: {0}")]
    Internal(String),
}

impl DataflowError {
    pub fn completion_failure(symbol: impl Into<String>) -> Self {
        DataflowError::CompletionFailure { symbol: symbol.into() }
    }
}

pub type DataflowResult<T> = Result<T, DataflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = DataflowError::completion_failure("com.example.Missing");
        assert_eq!(err.to_string(), "cannot resolve symbol `com.example.Missing`");

        let err = DataflowError::NonConvergent {
            fragment: "Test.f".to_string(),
            visits: 101,
            limit: 100,
        };
        assert!(err.to_string().contains("limit 100"));
    }
}
