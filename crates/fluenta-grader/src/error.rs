//! Grader error types.

use thiserror::Error;

/// Errors that can occur when talking to an external grader.
#[derive(Debug, Error)]
pub enum GraderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The response did not satisfy the score contract.
    #[error("malformed grader response: {0}")]
    MalformedResponse(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl GraderError {
    /// Permanent errors are not retried; retrying the same request cannot
    /// succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            GraderError::AuthenticationFailed(_) | GraderError::MalformedResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanence() {
        assert!(GraderError::AuthenticationFailed("bad key".into()).is_permanent());
        assert!(GraderError::MalformedResponse("no scores".into()).is_permanent());
        assert!(!GraderError::Timeout(30).is_permanent());
        assert!(!GraderError::RateLimited { retry_after_ms: 5000 }.is_permanent());
        assert!(!GraderError::ApiError {
            status: 500,
            message: "oops".into()
        }
        .is_permanent());
    }
}
