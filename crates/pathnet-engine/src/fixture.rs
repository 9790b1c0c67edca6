//! JSON graph fixtures loaded by the in-memory engine
//!
//! ```json
//! {
//!   "dataSources": ["CUSTOMERS"],
//!   "entities": [
//!     {"entityId": 1, "entityName": "John Smith",
//!      "records": [{"dataSource": "CUSTOMERS", "recordId": "1001"}],
//!      "features": {"NAME": [{"value": "John Smith", "usageType": "PRIMARY"}]}}
//!   ],
//!   "relationships": [{"from": 1, "to": 2, "matchLevel": 3, "matchKey": "+PHONE"}]
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use pathnet_core::RecordRef;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A complete entity graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Registered sources, in addition to those referenced by records
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub entities: Vec<FixtureEntity>,
    #[serde(default)]
    pub relationships: Vec<FixtureRelationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEntity {
    pub entity_id: i64,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub records: Vec<RecordRef>,
    #[serde(default)]
    pub features: BTreeMap<String, Vec<FixtureFeature>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureFeature {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
}

/// Undirected relationship between two entities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRelationship {
    pub from: i64,
    pub to: i64,
    #[serde(default)]
    pub match_level: i32,
    #[serde(default)]
    pub match_key: Option<String>,
    #[serde(default)]
    pub disclosed: bool,
    #[serde(default)]
    pub ambiguous: bool,
}

impl Fixture {
    /// Load and validate a fixture file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture = Self::parse(&content)?;
        tracing::debug!(
            "Loaded fixture {}: {} entities, {} relationships",
            path.display(),
            fixture.entities.len(),
            fixture.relationships.len()
        );
        Ok(fixture)
    }

    /// Parse and validate fixture JSON
    pub fn parse(json: &str) -> EngineResult<Self> {
        let fixture: Self = serde_json::from_str(json)?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Reject duplicate entities, records claimed by two entities and
    /// relationships to unknown entities
    pub fn validate(&self) -> EngineResult<()> {
        let mut ids = HashSet::new();
        let mut owners: HashMap<&RecordRef, i64> = HashMap::new();

        for entity in &self.entities {
            if !ids.insert(entity.entity_id) {
                return Err(EngineError::InvalidFixture(format!(
                    "duplicate entity {}",
                    entity.entity_id
                )));
            }
            for record in &entity.records {
                if let Some(owner) = owners.insert(record, entity.entity_id) {
                    return Err(EngineError::InvalidFixture(format!(
                        "record {}:{} belongs to entities {} and {}",
                        record.data_source, record.record_id, owner, entity.entity_id
                    )));
                }
            }
        }

        for rel in &self.relationships {
            for id in [rel.from, rel.to] {
                if !ids.contains(&id) {
                    return Err(EngineError::InvalidFixture(format!(
                        "relationship {} -> {} references unknown entity {}",
                        rel.from, rel.to, id
                    )));
                }
            }
            if rel.from == rel.to {
                return Err(EngineError::InvalidFixture(format!(
                    "entity {} is related to itself",
                    rel.from
                )));
            }
        }
        Ok(())
    }
}
