use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl AiError {
    /// Rate limits and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) | AiError::EmptyResponse(_) => true,
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Config(_) | AiError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let err = AiError::Api {
            status: 429,
            message: "slow down".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn bad_request_is_not_retryable() {
        let err = AiError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert!(!err.is_retryable());
        assert!(!AiError::Parse("x".into()).is_retryable());
    }
}
