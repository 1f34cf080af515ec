//! Provider gateway error types

use thiserror::Error;

/// Errors surfaced by a [`ProviderGateway`](crate::ProviderGateway) call.
///
/// Transport and API failures are classified so the orchestration layer can
/// tell a missing resource from throttling or a concurrent mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {0}")]
    Throttled(String),

    /// The provider refused a mutation because another one is in flight
    #[error("Conflicting operation in progress: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("API error{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        code: Option<String>,
        message: String,
    },
}

impl ProviderError {
    pub fn api(code: Option<&str>, message: impl Into<String>) -> Self {
        ProviderError::Api {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
