//! Quota Error Types

use super::model::ModelName;

/// Errors surfaced to callers of the admission path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// Request exceeds the model's single-call ceiling
    #[error("{model} token limit is {limit}, requested {requested}")]
    MaxTokenExceeded {
        model: ModelName,
        limit: u64,
        requested: u64,
    },

    /// No deployment of the model could ever hold this many tokens in one window
    #[error(
        "requested {tokens} tokens exceeds the quota of every deployment of {model}; raise the deployment quota"
    )]
    StructuralQuotaExceeded { model: ModelName, tokens: u64 },

    /// Request asked for no tokens
    #[error("requested token count for {model} must be greater than zero")]
    ZeroTokens { model: ModelName },
}

impl QuotaError {
    /// Stable numeric code reported to HTTP clients
    pub fn code(&self) -> u16 {
        match self {
            QuotaError::MaxTokenExceeded { .. } => 100,
            QuotaError::StructuralQuotaExceeded { .. } => 101,
            QuotaError::ZeroTokens { .. } => 102,
        }
    }
}

/// Errors raised while loading the resource catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Catalog file could not be read
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Catalog file is not valid TOML for the expected layout
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    /// A referenced environment variable is not set
    #[error("environment variable {var} required by {model}/{resource} is not set")]
    MissingEnv {
        model: String,
        resource: String,
        var: String,
    },

    /// Two resources of one model share a name
    #[error("duplicate resource '{resource}' under {model}")]
    DuplicateResource { model: ModelName, resource: String },

    /// Resource declared with no capacity
    #[error("resource '{resource}' under {model} has zero quota")]
    ZeroQuota { model: ModelName, resource: String },

    /// Quota too large to express in raw tokens
    #[error("resource '{resource}' under {model} has a quota that overflows in raw tokens")]
    QuotaOverflow { model: ModelName, resource: String },
}
