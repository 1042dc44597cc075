//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! invalid run configuration, grammar authoring mistakes surfaced while defining or
//! sampling rules, and generic errors.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid weight {weight} for rule '{rule}': weights must be finite and > 0")]
    InvalidWeight { rule: String, weight: f64 },

    #[error("unknown rule '{rule}'")]
    UnknownRule { rule: String },

    #[error("rule '{rule}' has open spawn points but no wrap-up production")]
    MissingWrapUpRule { rule: String },

    #[error("weighted sampling of rule '{rule}' selected no definition")]
    Weighting { rule: String },

    #[error("task was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
