//! Logical Model Names
//!
//! The closed set of models the broker hands out quota for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest number of tokens a single embedding call may carry
pub const EMBEDDING_MAX_REQUEST_TOKENS: u64 = 8191;

/// Logical model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelName {
    /// text-embedding-ada-002
    #[serde(rename = "text-embedding-ada-002")]
    EmbeddingAda002,
    /// text-embedding-3-small
    #[serde(rename = "text-embedding-3-small")]
    Embedding3Small,
    /// text-embedding-3-large
    #[serde(rename = "text-embedding-3-large")]
    Embedding3Large,
}

impl ModelName {
    /// Every model known to the broker
    pub const ALL: [ModelName; 3] = [
        ModelName::EmbeddingAda002,
        ModelName::Embedding3Small,
        ModelName::Embedding3Large,
    ];

    /// Wire name of the model
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::EmbeddingAda002 => "text-embedding-ada-002",
            ModelName::Embedding3Small => "text-embedding-3-small",
            ModelName::Embedding3Large => "text-embedding-3-large",
        }
    }

    /// Per-call token ceiling, independent of any deployment's window capacity
    pub fn max_request_tokens(&self) -> u64 {
        match self {
            ModelName::EmbeddingAda002
            | ModelName::Embedding3Small
            | ModelName::Embedding3Large => EMBEDDING_MAX_REQUEST_TOKENS,
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model name: {0}")]
pub struct UnknownModel(pub String);

impl FromStr for ModelName {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelName::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}
