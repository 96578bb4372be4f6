//! Error types shared across the crate.
//!
//! Fingerprinting and retry decisions are total and never produce these;
//! errors come from configuration loading, report output, and summarizer
//! backends.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A single summarizer backend failed.
    #[error("provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// Every backend in a fallback chain failed or refused.
    #[error("all {tried} summarizer providers failed")]
    ProvidersExhausted { tried: usize },

    #[error("invalid timestamp {input:?}: {source}")]
    InvalidTimestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let e = Error::provider("deepseek", "HTTP 529");
        assert_eq!(e.to_string(), "provider deepseek failed: HTTP 529");
    }

    #[test]
    fn test_timestamp_error_keeps_input() {
        let source = chrono::DateTime::parse_from_rfc3339("yesterday").unwrap_err();
        let e = Error::InvalidTimestamp {
            input: "yesterday".to_string(),
            source,
        };
        assert!(e.to_string().starts_with("invalid timestamp \"yesterday\""));
    }
}
