//! Error types for Pathnet Core

use thiserror::Error;

use crate::timers::TimerError;

/// Result type alias using Pathnet's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Pathnet error types
///
/// Validation variants map to 400-class responses, engine and unexpected
/// failures map to 500-class responses.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parameter missing or empty: \"{0}\"")]
    MissingParameter(String),

    #[error("Parameter is not formatted correctly: \"{parameter}\" (value: {value})")]
    MalformedIdentifier { parameter: String, value: String },

    #[error("Invalid value for parameter \"{parameter}\": {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("Entity identifiers for {context} must be of consistent types: [{}]", values.join(", "))]
    InconsistentIdentifierTypes { context: String, values: Vec<String> },

    #[error("Unrecognized data source: {0}")]
    UnknownDataSource(String),

    #[error("{parameter} must be {requirement}: {value}")]
    InvalidRange {
        parameter: String,
        requirement: &'static str,
        value: i64,
    },

    #[error("Engine failure ({code}): {message}")]
    EngineFailure { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl Error {
    /// HTTP status code this error is reported with
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// True for failures caused by the request's parameters
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_)
                | Self::MalformedIdentifier { .. }
                | Self::InvalidParameter { .. }
                | Self::InconsistentIdentifierTypes { .. }
                | Self::UnknownDataSource(_)
                | Self::InvalidRange { .. }
        )
    }

    /// Engine error code, if the failure came from the engine
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Self::EngineFailure { code, .. } => Some(*code),
            _ => None,
        }
    }
}
