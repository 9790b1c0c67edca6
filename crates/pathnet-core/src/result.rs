//! Typed path and network results parsed from engine documents

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifier::RecordRef;
use crate::server::FeatureClassifier;

// ─────────────────────────────────────────────────────────────────────────
// Engine document shapes
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativeDocument {
    #[serde(default)]
    entity_paths: Vec<NativePath>,
    #[serde(default)]
    entities: Vec<NativeEntity>,
    #[serde(default)]
    max_entity_limit_reached: Option<NativeFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativePath {
    start_entity_id: i64,
    end_entity_id: i64,
    #[serde(default)]
    entities: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativeEntity {
    resolved_entity: NativeResolved,
    #[serde(default)]
    related_entities: Vec<NativeRelated>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativeResolved {
    entity_id: i64,
    #[serde(default)]
    entity_name: Option<String>,
    #[serde(default)]
    features: BTreeMap<String, Vec<NativeFeature>>,
    #[serde(default)]
    records: Vec<NativeRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativeFeature {
    feat_desc: String,
    #[serde(default)]
    usage_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativeRecord {
    data_source: String,
    record_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct NativeRelated {
    entity_id: i64,
    #[serde(default)]
    entity_name: Option<String>,
    #[serde(default)]
    match_level: i32,
    #[serde(default)]
    match_key: Option<String>,
    #[serde(default)]
    is_disclosed: NativeFlag,
    #[serde(default)]
    is_ambiguous: NativeFlag,
}

/// Engine booleans arrive as `0`/`1` or `true`/`false`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum NativeFlag {
    Int(i64),
    Bool(bool),
}

impl Default for NativeFlag {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl NativeFlag {
    fn is_set(self) -> bool {
        match self {
            Self::Int(n) => n != 0,
            Self::Bool(b) => b,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Response payload types
// ─────────────────────────────────────────────────────────────────────────

/// One feature value of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
}

/// An entity as resolved by the engine, with features grouped by class
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntity {
    pub entity_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    pub records: Vec<RecordRef>,
    pub features: BTreeMap<String, Vec<FeatureValue>>,
    pub name_data: Vec<String>,
    pub address_data: Vec<String>,
    pub phone_data: Vec<String>,
    pub identifier_data: Vec<String>,
    pub characteristic_data: Vec<String>,
    pub other_data: Vec<String>,
}

/// A relationship from one entity to another
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    pub entity_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    pub match_level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_key: Option<String>,
    pub is_disclosed: bool,
    pub is_ambiguous: bool,
}

/// An entity together with its relationships
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityData {
    pub resolved_entity: ResolvedEntity,
    pub related_entities: Vec<RelatedEntity>,
}

/// Entity ids visited between two endpoints; empty when no path exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPath {
    pub start_entity_id: i64,
    pub end_entity_id: i64,
    pub entity_ids: Vec<i64>,
}

/// Relationship joining two consecutive entities of a path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathLink {
    pub from_entity_id: i64,
    pub to_entity_id: i64,
    pub match_level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_key: Option<String>,
}

/// Shortest path between two entities
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub entity_path: EntityPath,
    pub path_found: bool,
    /// Path entities first (in path order), then any others the engine returned
    pub entities: Vec<EntityData>,
    pub links: Vec<PathLink>,
}

/// Network of entities around a set of members
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResult {
    pub entity_paths: Vec<EntityPath>,
    pub entities: Vec<EntityData>,
    pub max_entity_limit_reached: bool,
}

// ─────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────

fn parse_document(raw: &str) -> Result<NativeDocument> {
    serde_json::from_str(raw).map_err(|e| {
        tracing::error!("Unparseable engine document: {}", e);
        Error::Unexpected(format!("Failed to parse engine result: {}", e))
    })
}

fn format_feature(feature: &str, value: &FeatureValue, prefix_feature: bool) -> String {
    match (&value.usage_type, prefix_feature) {
        (Some(usage), false) => format!("{}: {}", usage, value.value),
        (Some(usage), true) => format!("{} {}: {}", usage, feature, value.value),
        (None, true) => format!("{}: {}", feature, value.value),
        (None, false) => value.value.clone(),
    }
}

impl ResolvedEntity {
    fn from_native(native: NativeResolved, classify: &FeatureClassifier) -> Self {
        let mut entity = ResolvedEntity {
            entity_id: native.entity_id,
            entity_name: native.entity_name,
            records: native
                .records
                .into_iter()
                .map(|r| RecordRef::new(r.data_source, r.record_id))
                .collect(),
            ..Default::default()
        };

        for (feature, values) in native.features {
            let values: Vec<FeatureValue> = values
                .into_iter()
                .map(|f| FeatureValue {
                    value: f.feat_desc,
                    usage_type: f.usage_type.filter(|u| !u.is_empty()),
                })
                .collect();

            let class = classify(&feature);
            for value in &values {
                match class.as_deref() {
                    Some("NAME") => entity.name_data.push(format_feature(&feature, value, false)),
                    Some("ADDRESS") => entity.address_data.push(format_feature(&feature, value, false)),
                    Some("PHONE") => entity.phone_data.push(format_feature(&feature, value, false)),
                    Some("IDENTIFIER") => entity.identifier_data.push(format_feature(&feature, value, true)),
                    Some("ATTRIBUTE") => {
                        entity.characteristic_data.push(format_feature(&feature, value, true))
                    }
                    // relationship pointers are not displayed
                    Some("RELATIONSHIP") => {}
                    _ => entity.other_data.push(format_feature(&feature, value, true)),
                }
            }
            entity.features.insert(feature, values);
        }
        entity
    }
}

impl From<NativeRelated> for RelatedEntity {
    fn from(r: NativeRelated) -> Self {
        Self {
            entity_id: r.entity_id,
            entity_name: r.entity_name,
            match_level: r.match_level,
            match_key: r.match_key,
            is_disclosed: r.is_disclosed.is_set(),
            is_ambiguous: r.is_ambiguous.is_set(),
        }
    }
}

impl EntityData {
    fn from_native(native: NativeEntity, classify: &FeatureClassifier) -> Self {
        Self {
            resolved_entity: ResolvedEntity::from_native(native.resolved_entity, classify),
            related_entities: native.related_entities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entity_id(&self) -> i64 {
        self.resolved_entity.entity_id
    }
}

impl From<NativePath> for EntityPath {
    fn from(p: NativePath) -> Self {
        Self {
            start_entity_id: p.start_entity_id,
            end_entity_id: p.end_entity_id,
            entity_ids: p.entities,
        }
    }
}

impl PathResult {
    /// Parse a find-path document
    pub fn parse(raw: &str, classify: &FeatureClassifier) -> Result<Self> {
        let doc = parse_document(raw)?;
        let path: EntityPath = doc
            .entity_paths
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| Error::Unexpected("Engine result has no entity path".to_string()))?;

        let mut entities: Vec<EntityData> = doc
            .entities
            .into_iter()
            .map(|e| EntityData::from_native(e, classify))
            .collect();

        let position: HashMap<i64, usize> = path
            .entity_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        entities.sort_by_key(|e| position.get(&e.entity_id()).copied().unwrap_or(usize::MAX));

        let links = Self::connecting_links(&path, &entities);

        Ok(Self {
            path_found: !path.entity_ids.is_empty(),
            entity_path: path,
            entities,
            links,
        })
    }

    fn connecting_links(path: &EntityPath, entities: &[EntityData]) -> Vec<PathLink> {
        let by_id: HashMap<i64, &EntityData> = entities.iter().map(|e| (e.entity_id(), e)).collect();

        path.entity_ids
            .windows(2)
            .map(|pair| {
                let (from, to) = (pair[0], pair[1]);
                let related = by_id.get(&from).and_then(|e| {
                    e.related_entities.iter().find(|r| r.entity_id == to)
                });
                PathLink {
                    from_entity_id: from,
                    to_entity_id: to,
                    match_level: related.map(|r| r.match_level).unwrap_or_default(),
                    match_key: related.and_then(|r| r.match_key.clone()),
                }
            })
            .collect()
    }
}

impl NetworkResult {
    /// Parse a find-network document
    pub fn parse(raw: &str, classify: &FeatureClassifier) -> Result<Self> {
        let doc = parse_document(raw)?;
        Ok(Self {
            entity_paths: doc.entity_paths.into_iter().map(Into::into).collect(),
            entities: doc
                .entities
                .into_iter()
                .map(|e| EntityData::from_native(e, classify))
                .collect(),
            max_entity_limit_reached: doc
                .max_entity_limit_reached
                .map(NativeFlag::is_set)
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::default_attribute_class;

    const TWO_HOP: &str = r#"{
        "ENTITY_PATHS": [{"START_ENTITY_ID": 1, "END_ENTITY_ID": 2, "ENTITIES": [1, 2]}],
        "ENTITIES": [
            {
                "RESOLVED_ENTITY": {
                    "ENTITY_ID": 2,
                    "ENTITY_NAME": "Jane Smith",
                    "FEATURES": {"NAME": [{"FEAT_DESC": "Jane Smith", "USAGE_TYPE": "PRIMARY"}]},
                    "RECORDS": [{"DATA_SOURCE": "CUSTOMERS", "RECORD_ID": "1002"}]
                },
                "RELATED_ENTITIES": [{"ENTITY_ID": 1, "MATCH_LEVEL": 3, "MATCH_KEY": "+PHONE", "IS_DISCLOSED": 0, "IS_AMBIGUOUS": 0}]
            },
            {
                "RESOLVED_ENTITY": {
                    "ENTITY_ID": 1,
                    "ENTITY_NAME": "John Smith",
                    "FEATURES": {
                        "NAME": [{"FEAT_DESC": "John Smith", "USAGE_TYPE": "PRIMARY"}],
                        "PHONE": [{"FEAT_DESC": "702-555-1212", "USAGE_TYPE": "HOME"}],
                        "SSN": [{"FEAT_DESC": "111-22-3333"}],
                        "DOB": [{"FEAT_DESC": "1980-01-01"}],
                        "SHOE_SIZE": [{"FEAT_DESC": "11"}]
                    },
                    "RECORDS": [{"DATA_SOURCE": "CUSTOMERS", "RECORD_ID": "1001"}]
                },
                "RELATED_ENTITIES": [{"ENTITY_ID": 2, "MATCH_LEVEL": 3, "MATCH_KEY": "+PHONE", "IS_DISCLOSED": 0, "IS_AMBIGUOUS": 1}]
            }
        ]
    }"#;

    #[test]
    fn test_parse_path_orders_entities_and_links() {
        let result = PathResult::parse(TWO_HOP, &default_attribute_class).unwrap();

        assert!(result.path_found);
        assert_eq!(result.entity_path.entity_ids, vec![1, 2]);
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.entities[0].entity_id(), 1);
        assert_eq!(result.entities[1].entity_id(), 2);

        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].match_key.as_deref(), Some("+PHONE"));
        assert!(result.entities[0].related_entities[0].is_ambiguous);
    }

    #[test]
    fn test_features_grouped_by_class() {
        let result = PathResult::parse(TWO_HOP, &default_attribute_class).unwrap();
        let john = &result.entities[0].resolved_entity;

        assert_eq!(john.name_data, vec!["PRIMARY: John Smith"]);
        assert_eq!(john.phone_data, vec!["HOME: 702-555-1212"]);
        assert_eq!(john.identifier_data, vec!["SSN: 111-22-3333"]);
        assert_eq!(john.characteristic_data, vec!["DOB: 1980-01-01"]);
        assert_eq!(john.other_data, vec!["SHOE_SIZE: 11"]);
        assert_eq!(john.records, vec![RecordRef::new("CUSTOMERS", "1001")]);
    }

    #[test]
    fn test_no_path() {
        let raw = r#"{"ENTITY_PATHS":[{"START_ENTITY_ID":1,"END_ENTITY_ID":9,"ENTITIES":[]}],"ENTITIES":[]}"#;
        let result = PathResult::parse(raw, &default_attribute_class).unwrap();
        assert!(!result.path_found);
        assert!(result.links.is_empty());
    }

    #[test]
    fn test_unparseable_document() {
        assert!(matches!(
            PathResult::parse("not json", &default_attribute_class),
            Err(Error::Unexpected(_))
        ));
        assert!(PathResult::parse("{}", &default_attribute_class).is_err());
    }

    #[test]
    fn test_parse_network() {
        let raw = r#"{
            "ENTITY_PATHS": [{"START_ENTITY_ID": 1, "END_ENTITY_ID": 3, "ENTITIES": [1, 2, 3]}],
            "ENTITIES": [
                {"RESOLVED_ENTITY": {"ENTITY_ID": 1}},
                {"RESOLVED_ENTITY": {"ENTITY_ID": 2}},
                {"RESOLVED_ENTITY": {"ENTITY_ID": 3}}
            ],
            "MAX_ENTITY_LIMIT_REACHED": true
        }"#;
        let result = NetworkResult::parse(raw, &default_attribute_class).unwrap();
        assert_eq!(result.entity_paths.len(), 1);
        assert_eq!(result.entities.len(), 3);
        assert!(result.max_entity_limit_reached);
    }

    #[test]
    fn test_custom_classifier() {
        let classify = |feature: &str| (feature == "SHOE_SIZE").then(|| "ATTRIBUTE".to_string());
        let result = PathResult::parse(TWO_HOP, &classify).unwrap();
        let john = &result.entities[0].resolved_entity;
        assert_eq!(john.characteristic_data, vec!["SHOE_SIZE: 11"]);
        assert!(john.name_data.is_empty());
    }
}
