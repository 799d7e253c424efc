use thiserror::Error;

/// Configuration errors raised while building the middleware.
///
/// None of these ever surface during request processing: every variant is
/// reported by the constructor or `with_*` method that received the bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Invalid mime type pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("The renderer \"{0}\" cannot be found.")]
    RendererNotFound(String),

    #[error("Invalid IP range: {0}")]
    InvalidIpRange(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GuardError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: &'static str) -> Self {
        GuardError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        }
    }
}

/// Convenience type alias for Results with GuardError.
pub type GuardResult<T> = Result<T, GuardError>;
