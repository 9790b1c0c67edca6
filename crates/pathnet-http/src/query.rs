//! Multi-valued query string parsing
//!
//! Avoid lists (`x`), source filters (`s`) and network members (`e`) are
//! passed by repeating the parameter, so the query is kept as an ordered
//! list of pairs instead of a map.

use pathnet_core::limits::{
    DEFAULT_BUILD_OUT, DEFAULT_MAX_ENTITIES, DEFAULT_NETWORK_MAX_DEGREES, DEFAULT_PATH_MAX_DEGREES,
};
use pathnet_core::{Error, NetworkParams, PathParams, Result};

/// Decoded query parameters in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decode a raw query string; `None` yields no parameters
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self { pairs }
    }

    /// First value of a parameter
    pub fn first(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a repeated parameter, in order
    pub fn all(&self, name: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn integer(&self, name: &str, default: i64) -> Result<i64> {
        match self.first(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| Error::InvalidParameter {
                parameter: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// `true`/`false` in any case; a bare `?withRaw` counts as true
    pub fn flag(&self, name: &str, default: bool) -> Result<bool> {
        match self.first(name).map(str::trim) {
            None => Ok(default),
            Some("") => Ok(true),
            Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
            Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
            Some(value) => Err(Error::InvalidParameter {
                parameter: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Parameters of `GET /entity-paths`
    pub fn path_params(&self) -> Result<PathParams> {
        Ok(PathParams {
            from: self.first("from").map(str::to_string),
            to: self.first("to").map(str::to_string),
            max_degrees: self.integer("maxDegrees", DEFAULT_PATH_MAX_DEGREES)?,
            avoid: self.all("x"),
            forbid_avoided: self.flag("forbidAvoided", false)?,
            sources: self.all("s"),
            with_raw: self.flag("withRaw", false)?,
        })
    }

    /// Parameters of `GET /entity-networks`
    pub fn network_params(&self) -> Result<NetworkParams> {
        Ok(NetworkParams {
            entities: self.all("e"),
            max_degrees: self.integer("maxDegrees", DEFAULT_NETWORK_MAX_DEGREES)?,
            build_out: self.integer("buildOut", DEFAULT_BUILD_OUT)?,
            max_entities: self.integer("maxEntities", DEFAULT_MAX_ENTITIES)?,
            with_raw: self.flag("withRaw", false)?,
        })
    }
}
