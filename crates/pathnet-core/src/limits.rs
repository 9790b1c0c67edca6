//! Parameter defaults and range checks

use crate::error::{Error, Result};

/// Default `maxDegrees` for entity paths
pub const DEFAULT_PATH_MAX_DEGREES: i64 = 3;

/// Default `maxDegrees` for entity networks
pub const DEFAULT_NETWORK_MAX_DEGREES: i64 = 5;

/// Default `buildOut` for entity networks
pub const DEFAULT_BUILD_OUT: i64 = 1;

/// Default `maxEntities` for entity networks
pub const DEFAULT_MAX_ENTITIES: i64 = 1000;

fn range_error(parameter: &str, requirement: &'static str, value: i64) -> Error {
    Error::InvalidRange {
        parameter: parameter.to_string(),
        requirement,
        value,
    }
}

/// Validate `maxDegrees` (at least 1)
pub fn validate_max_degrees(value: i64) -> Result<u32> {
    if value < 1 {
        return Err(range_error("maxDegrees", "greater than zero", value));
    }
    u32::try_from(value).map_err(|_| range_error("maxDegrees", "a 32-bit value", value))
}

/// Validate `buildOut` (zero or more)
pub fn validate_build_out(value: i64) -> Result<u32> {
    if value < 0 {
        return Err(range_error("buildOut", "zero or greater", value));
    }
    u32::try_from(value).map_err(|_| range_error("buildOut", "a 32-bit value", value))
}

/// Validate `maxEntities` (at least 1)
pub fn validate_max_entities(value: i64) -> Result<u32> {
    if value < 1 {
        return Err(range_error("maxEntities", "greater than zero", value));
    }
    u32::try_from(value).map_err(|_| range_error("maxEntities", "a 32-bit value", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_degrees_boundary() {
        assert!(validate_max_degrees(0).is_err());
        assert!(validate_max_degrees(-3).is_err());
        assert_eq!(validate_max_degrees(1).unwrap(), 1);
    }

    #[test]
    fn test_build_out_boundary() {
        assert!(validate_build_out(-1).is_err());
        assert_eq!(validate_build_out(0).unwrap(), 0);
    }

    #[test]
    fn test_max_entities_boundary() {
        assert!(validate_max_entities(0).is_err());
        assert_eq!(validate_max_entities(1).unwrap(), 1);
    }

    #[test]
    fn test_error_echoes_value() {
        let err = validate_max_degrees(0).unwrap_err();
        assert_eq!(err.to_string(), "maxDegrees must be greater than zero: 0");
    }
}
