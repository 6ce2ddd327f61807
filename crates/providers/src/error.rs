//! Error types for provider operations.

use bankwatch_core::AccountProvider;
use thiserror::Error;

/// The account's configuration blob does not match what the provider expects.
#[derive(Debug, Error)]
#[error("Invalid {provider} configuration: {reason}")]
pub struct ConfigurationError {
    pub provider: AccountProvider,
    pub reason: String,
}

/// Errors that can occur while talking to a bank.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Balance checkpoint failed: {0}")]
    Checkpoint(#[from] std::io::Error),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

impl ProviderError {
    /// Returns true if retrying on the next tick may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let throttled = ProviderError::Status {
            status: 429,
            body: String::new(),
        };
        let forbidden = ProviderError::Status {
            status: 403,
            body: String::new(),
        };
        let config = ProviderError::from(ConfigurationError {
            provider: AccountProvider::Monobank,
            reason: "missing field `api_token`".to_string(),
        });

        assert!(throttled.is_transient());
        assert!(!forbidden.is_transient());
        assert!(!config.is_transient());
        assert_eq!(
            config.to_string(),
            "Invalid MonoBank configuration: missing field `api_token`"
        );
    }
}
