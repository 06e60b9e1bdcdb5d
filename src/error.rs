//! Error types for tapline.
//!
//! Errors only arise while building configuration. Once a layer is running,
//! nothing in the logging path produces an error that reaches the caller.

use thiserror::Error;

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A filter pattern failed to compile as a regular expression
    #[error("invalid filter pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An option carried a value that could not be parsed
    #[error("invalid value `{value}` for option {name}")]
    InvalidValue { name: String, value: String },
}

impl ConfigError {
    pub(crate) fn invalid_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name: name.into(),
            value: value.into(),
        }
    }
}
