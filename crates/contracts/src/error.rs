//! Layered error definitions
//!
//! Categorized by stage: config / fetch / historical / sink

use thiserror::Error;

use crate::SourceTag;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Fetch Errors =====
    /// A single fetch call raised (transport, decode, ...)
    #[error("{source_tag} fetch for '{location}' failed: {message}")]
    Fetch {
        source_tag: SourceTag,
        location: String,
        message: String,
    },

    /// Every attempt of a retried fetch raised
    #[error("{source_tag} fetch for '{location}' failed after {attempts} attempts: {message}")]
    FetchExhausted {
        source_tag: SourceTag,
        location: String,
        attempts: u32,
        message: String,
    },

    // ===== Historical Errors =====
    /// Historical table could not be read
    #[error("historical read from '{provider}' failed: {message}")]
    HistoricalRead { provider: String, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create fetch error
    pub fn fetch(
        source_tag: SourceTag,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Fetch {
            source_tag,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create historical read error
    pub fn historical_read(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HistoricalRead {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
