//! Error types for schema inference and code generation

use thiserror::Error;

/// Result type for typegen operations
pub type Result<T> = std::result::Result<T, TypegenError>;

/// Errors raised while reading samples, building the schema tree or emitting code
#[derive(Error, Debug)]
pub enum TypegenError {
    #[error("Cannot read source {name}: {source}")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed XML in {source_name} at byte {position}: {message}")]
    Decode {
        source_name: String,
        position: u64,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Template {template} failed to render: {message}")]
    Template { template: String, message: String },

    #[error("No usable XML sources")]
    NoSources,

    #[error("Nothing to generate: no elements were observed")]
    EmptySchema,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config_crate::ConfigError),
}

impl TypegenError {
    /// Whether the error is recoverable by skipping the current source
    pub fn is_per_source(&self) -> bool {
        matches!(self, Self::Source { .. } | Self::Fetch { .. } | Self::Decode { .. })
    }

    pub(crate) fn template(template: &str, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.to_string(),
            message: message.into(),
        }
    }
}
