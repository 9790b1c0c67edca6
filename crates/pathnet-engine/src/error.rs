//! Engine error types

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine-specific error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid JSON argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown record: dsrc[{data_source}], record[{record_id}]")]
    UnknownRecord {
        data_source: String,
        record_id: String,
    },

    #[error("Unknown resolved entity value '{0}'")]
    UnknownEntity(i64),

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Numeric code reported through `last_exception_code`
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => 7,
            Self::UnknownRecord { .. } => 33,
            Self::UnknownEntity(_) => 37,
            Self::InvalidFixture(_) | Self::Serialization(_) | Self::Io(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(EngineError::InvalidArgument("x".into()).code(), 7);
        assert_eq!(EngineError::UnknownEntity(9).code(), 37);
        let err = EngineError::UnknownRecord {
            data_source: "CUSTOMERS".into(),
            record_id: "9".into(),
        };
        assert_eq!(err.code(), 33);
        assert_eq!(err.to_string(), "Unknown record: dsrc[CUSTOMERS], record[9]");
    }
}
