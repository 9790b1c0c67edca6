//! Raw query parameters and the typed requests validated from them

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifier::{check_consistent, parse_all, EntityIdentifier, IdentifierKind};
use crate::limits::{
    validate_build_out, validate_max_degrees, validate_max_entities, DEFAULT_BUILD_OUT,
    DEFAULT_MAX_ENTITIES, DEFAULT_NETWORK_MAX_DEGREES, DEFAULT_PATH_MAX_DEGREES,
};
use crate::server::ServerInfo;

/// Unvalidated `entity-paths` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathParams {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_path_degrees")]
    pub max_degrees: i64,
    /// Avoided entities (`x`)
    #[serde(default)]
    pub avoid: Vec<String>,
    #[serde(default)]
    pub forbid_avoided: bool,
    /// Required data sources (`s`)
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub with_raw: bool,
}

fn default_path_degrees() -> i64 {
    DEFAULT_PATH_MAX_DEGREES
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            max_degrees: DEFAULT_PATH_MAX_DEGREES,
            avoid: Vec::new(),
            forbid_avoided: false,
            sources: Vec::new(),
            with_raw: false,
        }
    }
}

impl PathParams {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            ..Default::default()
        }
    }

    pub fn with_max_degrees(mut self, max_degrees: i64) -> Self {
        self.max_degrees = max_degrees;
        self
    }

    pub fn avoiding(mut self, id: impl Into<String>) -> Self {
        self.avoid.push(id.into());
        self
    }

    pub fn forbid_avoided(mut self) -> Self {
        self.forbid_avoided = true;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_raw(mut self) -> Self {
        self.with_raw = true;
        self
    }
}

/// Unvalidated `entity-networks` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    /// Member entities (`e`)
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default = "default_network_degrees")]
    pub max_degrees: i64,
    #[serde(default = "default_build_out")]
    pub build_out: i64,
    #[serde(default = "default_max_entities")]
    pub max_entities: i64,
    #[serde(default)]
    pub with_raw: bool,
}

fn default_network_degrees() -> i64 {
    DEFAULT_NETWORK_MAX_DEGREES
}

fn default_build_out() -> i64 {
    DEFAULT_BUILD_OUT
}

fn default_max_entities() -> i64 {
    DEFAULT_MAX_ENTITIES
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            max_degrees: DEFAULT_NETWORK_MAX_DEGREES,
            build_out: DEFAULT_BUILD_OUT,
            max_entities: DEFAULT_MAX_ENTITIES,
            with_raw: false,
        }
    }
}

impl NetworkParams {
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_max_degrees(mut self, max_degrees: i64) -> Self {
        self.max_degrees = max_degrees;
        self
    }

    pub fn with_build_out(mut self, build_out: i64) -> Self {
        self.build_out = build_out;
        self
    }

    pub fn with_max_entities(mut self, max_entities: i64) -> Self {
        self.max_entities = max_entities;
        self
    }

    pub fn with_raw(mut self) -> Self {
        self.with_raw = true;
        self
    }
}

/// A validated shortest-path request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRequest {
    pub from: EntityIdentifier,
    pub to: EntityIdentifier,
    pub max_degrees: u32,
    pub avoid_entities: Option<Vec<EntityIdentifier>>,
    pub forbid_avoided: bool,
    pub with_sources: Option<BTreeSet<String>>,
    pub with_raw: bool,
}

fn required<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingParameter(name.to_string())),
    }
}

impl PathRequest {
    /// Validate parameters in a fixed order, failing on the first problem
    pub fn from_params(params: &PathParams, server: &ServerInfo) -> Result<Self> {
        let from = EntityIdentifier::parse_param("from", required("from", &params.from)?)?;
        let to = EntityIdentifier::parse_param("to", required("to", &params.to)?)?;

        if from.kind() != to.kind() {
            return Err(Error::InconsistentIdentifierTypes {
                context: "from and to".to_string(),
                values: vec![from.to_string(), to.to_string()],
            });
        }

        let avoid_entities = if params.avoid.is_empty() {
            None
        } else {
            let avoided = parse_all("x", &params.avoid)?;
            if !check_consistent(&avoided) || avoided[0].kind() != from.kind() {
                let mut values = vec![from.to_string(), to.to_string()];
                values.extend(avoided.iter().map(ToString::to_string));
                return Err(Error::InconsistentIdentifierTypes {
                    context: "avoided entities".to_string(),
                    values,
                });
            }
            Some(avoided)
        };

        let with_sources = if params.sources.is_empty() {
            None
        } else {
            let mut sources = BTreeSet::new();
            for source in &params.sources {
                let source = source.trim();
                if !server.has_data_source(source) {
                    return Err(Error::UnknownDataSource(source.to_string()));
                }
                sources.insert(source.to_string());
            }
            Some(sources)
        };

        let max_degrees = validate_max_degrees(params.max_degrees)?;

        Ok(Self {
            from,
            to,
            max_degrees,
            avoid_entities,
            forbid_avoided: params.forbid_avoided,
            with_sources,
            with_raw: params.with_raw,
        })
    }

    pub fn kind(&self) -> IdentifierKind {
        self.from.kind()
    }
}

/// A validated entity-network request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub entities: Vec<EntityIdentifier>,
    pub max_degrees: u32,
    pub build_out: u32,
    pub max_entities: u32,
    pub with_raw: bool,
}

impl NetworkRequest {
    pub fn from_params(params: &NetworkParams) -> Result<Self> {
        if params.entities.is_empty() {
            return Err(Error::MissingParameter("e".to_string()));
        }

        let entities = parse_all("e", &params.entities)?;
        if !check_consistent(&entities) {
            return Err(Error::InconsistentIdentifierTypes {
                context: "entities".to_string(),
                values: entities.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(Self {
            entities,
            max_degrees: validate_max_degrees(params.max_degrees)?,
            build_out: validate_build_out(params.build_out)?,
            max_entities: validate_max_entities(params.max_entities)?,
            with_raw: params.with_raw,
        })
    }

    /// Variant shared by every member, `None` when there are no members
    pub fn kind(&self) -> Option<IdentifierKind> {
        self.entities.first().map(EntityIdentifier::kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerInfo {
        ServerInfo::new(["CUSTOMERS", "WATCHLIST"])
    }

    #[test]
    fn test_valid_record_path() {
        let params = PathParams::new("CUSTOMERS:1001", "CUSTOMERS:1002");
        let req = PathRequest::from_params(&params, &server()).unwrap();
        assert_eq!(req.from, EntityIdentifier::record("CUSTOMERS", "1001"));
        assert_eq!(req.max_degrees, 3);
        assert!(req.avoid_entities.is_none());
        assert!(req.with_sources.is_none());
        assert!(!req.with_raw);
    }

    #[test]
    fn test_missing_from_reported_before_missing_to() {
        let params = PathParams::default();
        match PathRequest::from_params(&params, &server()) {
            Err(Error::MissingParameter(name)) => assert_eq!(name, "from"),
            other => panic!("unexpected: {:?}", other),
        }

        let params = PathParams {
            from: Some("1".into()),
            to: Some("   ".into()),
            ..Default::default()
        };
        match PathRequest::from_params(&params, &server()) {
            Err(Error::MissingParameter(name)) => assert_eq!(name, "to"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_from() {
        let params = PathParams::new("not-an-id", "2");
        assert!(matches!(
            PathRequest::from_params(&params, &server()),
            Err(Error::MalformedIdentifier { ref parameter, .. }) if parameter == "from"
        ));
    }

    #[test]
    fn test_mixed_endpoints_rejected() {
        let params = PathParams::new("1", "CUSTOMERS:1002");
        assert!(matches!(
            PathRequest::from_params(&params, &server()),
            Err(Error::InconsistentIdentifierTypes { .. })
        ));
    }

    #[test]
    fn test_avoid_list_must_match_endpoints() {
        let params = PathParams::new("1", "2").avoiding("3").avoiding("CUSTOMERS:1001");
        match PathRequest::from_params(&params, &server()) {
            Err(Error::InconsistentIdentifierTypes { values, .. }) => {
                assert!(values.contains(&"CUSTOMERS:1001".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }

        // uniform avoid list of the other variant is also rejected
        let params = PathParams::new("1", "2").avoiding("CUSTOMERS:1001");
        assert!(PathRequest::from_params(&params, &server()).is_err());

        let params = PathParams::new("1", "2").avoiding("3").avoiding("4");
        let req = PathRequest::from_params(&params, &server()).unwrap();
        assert_eq!(
            req.avoid_entities,
            Some(vec![EntityIdentifier::entity(3), EntityIdentifier::entity(4)])
        );
    }

    #[test]
    fn test_unknown_source_named() {
        let params = PathParams::new("1", "2").with_source("UNKNOWN_SOURCE");
        match PathRequest::from_params(&params, &server()) {
            Err(Error::UnknownDataSource(source)) => assert_eq!(source, "UNKNOWN_SOURCE"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sources_deduplicated() {
        let params = PathParams::new("1", "2")
            .with_source("WATCHLIST")
            .with_source("CUSTOMERS")
            .with_source("WATCHLIST");
        let req = PathRequest::from_params(&params, &server()).unwrap();
        let sources: Vec<_> = req.with_sources.unwrap().into_iter().collect();
        assert_eq!(sources, vec!["CUSTOMERS", "WATCHLIST"]);
    }

    #[test]
    fn test_path_max_degrees_boundary() {
        let params = PathParams::new("1", "2").with_max_degrees(0);
        assert!(matches!(
            PathRequest::from_params(&params, &server()),
            Err(Error::InvalidRange { value: 0, .. })
        ));
        let params = PathParams::new("1", "2").with_max_degrees(1);
        assert_eq!(PathRequest::from_params(&params, &server()).unwrap().max_degrees, 1);
    }

    #[test]
    fn test_network_validation() {
        assert!(matches!(
            NetworkRequest::from_params(&NetworkParams::default()),
            Err(Error::MissingParameter(ref p)) if p == "e"
        ));
        assert!(matches!(
            NetworkRequest::from_params(&NetworkParams::new(["1", "CUSTOMERS:1"])),
            Err(Error::InconsistentIdentifierTypes { .. })
        ));

        let req = NetworkRequest::from_params(&NetworkParams::new(["1", "2"])).unwrap();
        assert_eq!(req.kind(), Some(IdentifierKind::Entity));
        assert_eq!((req.max_degrees, req.build_out, req.max_entities), (5, 1, 1000));
    }

    #[test]
    fn test_blank_network_member_rejected() {
        match NetworkRequest::from_params(&NetworkParams::new(["1", ""])) {
            Err(Error::MalformedIdentifier { parameter, value }) => {
                assert_eq!(parameter, "e");
                assert_eq!(value, "");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            NetworkRequest::from_params(&NetworkParams::new(["  "])),
            Err(Error::MalformedIdentifier { ref parameter, .. }) if parameter == "e"
        ));
    }

    #[test]
    fn test_network_range_boundaries() {
        let base = NetworkParams::new(["1"]);
        assert!(NetworkRequest::from_params(&base.clone().with_max_degrees(0)).is_err());
        assert!(NetworkRequest::from_params(&base.clone().with_max_degrees(1)).is_ok());
        assert!(NetworkRequest::from_params(&base.clone().with_build_out(-1)).is_err());
        assert!(NetworkRequest::from_params(&base.clone().with_build_out(0)).is_ok());
        assert!(NetworkRequest::from_params(&base.clone().with_max_entities(0)).is_err());
        assert!(NetworkRequest::from_params(&base.with_max_entities(1)).is_ok());
    }
}
