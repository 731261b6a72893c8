//! Resolver errors

use thiserror::Error;

/// Result type for resolver calls
pub type ResolverResult<T> = Result<T, ResolverError>;

/// Resolver errors; neither kind is retried
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolverError {
    #[error("Resolver unreachable: {0}")]
    Transport(String),

    #[error("Malformed resolver response: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ResolverError::Transport("connection refused".into()).to_string(),
            "Resolver unreachable: connection refused"
        );
        assert!(ResolverError::Malformed("eof".into())
            .to_string()
            .starts_with("Malformed"));
    }
}
