//! Error type definitions for the playlist aggregator

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
///
/// Uses `thiserror` to provide the error trait implementations and proper
/// error chaining for the few fallible edges of the crate.
#[derive(Error, Debug)]
pub enum AggregatorError {
    /// Configuration could not be extracted from its layered providers
    #[error("Configuration error: {0}")]
    Configuration(#[from] Box<figment::Error>),

    /// Reading an input or writing the output failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be written out as TOML
    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// A pre-structured directory was not valid JSON of the expected shape
    #[error("Directory JSON error: {0}")]
    DirectoryJson(#[from] serde_json::Error),

    /// Input rejected before it reached the core
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl AggregatorError {
    /// Create an I/O error bound to the path it happened on
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid input error with a custom message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<figment::Error> for AggregatorError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(Box::new(err))
    }
}
