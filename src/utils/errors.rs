use thiserror::Error;

use crate::models::Provider;

/// A backend configuration that can never produce a working adapter.
/// Raised at construction time and surfaced to the operator.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown AI provider: {0}")]
    UnknownProvider(String),

    #[error("Provider '{0}' requires a base URL")]
    MissingBaseUrl(Provider),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single backend call failed. Never retried by this crate.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed arguments for tool '{tool}': {source}")]
    MalformedToolArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// HTTP status of the failed call, if the remote answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        let err = BackendError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.to_string(), "Backend returned HTTP 429: slow down");

        let err = BackendError::InvalidResponse("no choices".to_string());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::MissingBaseUrl(Provider::OpenAiCompatible);
        assert_eq!(
            err.to_string(),
            "Provider 'openai-compatible' requires a base URL"
        );
        let err = ConfigError::UnknownProvider("unknown-x".to_string());
        assert_eq!(err.to_string(), "Unknown AI provider: unknown-x");
    }
}
