//! Custom error types for translation operations

use std::fmt;

use thiserror::Error;

/// One provider's terminal error inside a routed call
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: TranslationError,
    pub attempts: u32,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (after {} attempt{})",
            self.provider,
            self.error,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Credentials rejected by the provider
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Provider reported rate limiting
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimitExceeded { retry_after: Option<u64> },

    /// Connection reset, DNS failure and friends
    #[error("Network error: {message}")]
    TransientNetwork { message: String },

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// 5xx from the provider
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// 4xx other than 408/429
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Invalid response from API
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Retries for one provider exhausted
    #[error("Max retries exceeded after {attempts} attempts: {source}")]
    MaxRetriesExceeded {
        attempts: u32,
        #[source]
        source: Box<TranslationError>,
    },

    /// No enabled provider with credentials
    #[error("No translation providers available for target language '{target_lang}'")]
    NoProvidersAvailable { target_lang: String },

    /// Every provider in the fallback chain failed
    #[error("All providers failed: {}", format_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },

    /// Caller cancelled the routed call
    #[error("Translation cancelled")]
    Cancelled,

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError { path: String, message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid file format
    #[error("Invalid file format: {format}")]
    InvalidFormat { format: String },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .enumerate()
        .map(|(i, failure)| format!("[{}] {}", i + 1, failure))
        .collect::<Vec<_>>()
        .join("; ")
}

impl TranslationError {
    /// Map a non-2xx HTTP status to the matching error class
    pub fn from_status(status: u16, message: String, retry_after: Option<u64>) -> Self {
        match status {
            401 | 403 => TranslationError::Authentication { message },
            408 => TranslationError::Timeout,
            429 => TranslationError::RateLimitExceeded { retry_after },
            500..=599 => TranslationError::ServerError { status, message },
            _ => TranslationError::ClientError { status, message },
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranslationError::Timeout
        } else {
            TranslationError::TransientNetwork {
                message: err.to_string(),
            }
        }
    }

    /// Whether another attempt against the same provider may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::RateLimitExceeded { .. }
            | TranslationError::TransientNetwork { .. }
            | TranslationError::Timeout => true,
            TranslationError::ServerError { status, .. } => {
                matches!(status, 500 | 502 | 503 | 504)
            }
            TranslationError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Error kind as a short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TranslationError::Authentication { .. } => "authentication_error",
            TranslationError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            TranslationError::TransientNetwork { .. } | TranslationError::HttpError(_) => {
                "network_error"
            }
            TranslationError::Timeout => "timeout",
            TranslationError::ServerError { .. } => "server_error",
            TranslationError::ClientError { .. } => "client_error",
            TranslationError::InvalidResponse { .. } => "invalid_response",
            TranslationError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            TranslationError::NoProvidersAvailable { .. } => "no_providers_available",
            TranslationError::AllProvidersFailed { .. } => "all_providers_failed",
            TranslationError::Cancelled => "cancelled",
            TranslationError::ConfigError { .. } => "config_error",
            _ => "internal_error",
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
