//! Entity identifiers: a (data source, record id) pair or a resolved entity id

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Which of the two identifier variants a value is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Record,
    Entity,
}

impl IdentifierKind {
    /// Row index into the dispatch tables
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Record => 0,
            Self::Entity => 1,
        }
    }
}

/// A record within a data source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub data_source: String,
    pub record_id: String,
}

impl RecordRef {
    pub fn new(data_source: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            record_id: record_id.into(),
        }
    }
}

/// Identifies an entity either by one of its records or by its entity id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityIdentifier {
    Record(RecordRef),
    Entity { id: i64 },
}

impl EntityIdentifier {
    pub fn record(data_source: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self::Record(RecordRef::new(data_source, record_id))
    }

    pub fn entity(id: i64) -> Self {
        Self::Entity { id }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            Self::Record(_) => IdentifierKind::Record,
            Self::Entity { .. } => IdentifierKind::Entity,
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(r) => Some(r),
            Self::Entity { .. } => None,
        }
    }

    pub fn as_entity_id(&self) -> Option<i64> {
        match self {
            Self::Entity { id } => Some(*id),
            Self::Record(_) => None,
        }
    }

    /// Parse identifier text.
    ///
    /// A bare integer is an entity id. Otherwise the text is either a JSON
    /// object (`{"src":..,"id":..}`, `{"ENTITY_ID":..}` and friends) or a
    /// `DATA_SOURCE:RECORD_ID` token split at the first colon.
    pub fn parse(text: &str) -> std::result::Result<Self, ParseIdentifierError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseIdentifierError);
        }

        if let Ok(id) = text.parse::<i64>() {
            return Ok(Self::Entity { id });
        }

        if text.starts_with('{') {
            return Self::parse_json(text);
        }

        let (source, record) = text.split_once(':').ok_or(ParseIdentifierError)?;
        let (source, record) = (source.trim(), record.trim());
        if source.is_empty() || record.is_empty() {
            return Err(ParseIdentifierError);
        }
        Ok(Self::record(source, record))
    }

    fn parse_json(text: &str) -> std::result::Result<Self, ParseIdentifierError> {
        let value: Value = serde_json::from_str(text).map_err(|_| ParseIdentifierError)?;
        let obj = value.as_object().ok_or(ParseIdentifierError)?;

        for key in ["ENTITY_ID", "entityId", "id"] {
            if let Some(id) = obj.get(key).and_then(Value::as_i64) {
                if key != "id" || obj.len() == 1 {
                    return Ok(Self::Entity { id });
                }
            }
        }

        let field = |keys: &[&str]| {
            keys.iter().find_map(|k| match obj.get(*k) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
        };

        let source = field(&["src", "dataSource", "DATA_SOURCE"]).ok_or(ParseIdentifierError)?;
        let record = field(&["id", "recordId", "RECORD_ID"]).ok_or(ParseIdentifierError)?;
        Ok(Self::record(source, record))
    }

    /// Parse text, reporting failures against the named parameter
    pub fn parse_param(parameter: &str, text: &str) -> Result<Self> {
        Self::parse(text).map_err(|_| Error::MalformedIdentifier {
            parameter: parameter.to_string(),
            value: text.to_string(),
        })
    }

    /// The engine's JSON form of this identifier
    pub fn to_native_json(&self) -> Value {
        match self {
            Self::Record(r) => json!({
                "DATA_SOURCE": r.data_source,
                "RECORD_ID": r.record_id,
            }),
            Self::Entity { id } => json!({ "ENTITY_ID": id }),
        }
    }
}

impl RecordRef {
    /// Whether `SRC:ID` text would parse back to this record
    fn has_plain_text_form(&self) -> bool {
        let source = self.data_source.as_str();
        !source.is_empty()
            && !source.contains(':')
            && !source.starts_with('{')
            && source.trim() == source
            && !self.record_id.is_empty()
            && self.record_id.trim() == self.record_id
    }
}

/// Canonical text: `n` or `SRC:ID`, falling back to `{"src":..,"id":..}`
/// for records whose plain form would reparse differently
impl std::fmt::Display for EntityIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(r) if r.has_plain_text_form() => {
                write!(f, "{}:{}", r.data_source, r.record_id)
            }
            Self::Record(r) => write!(f, "{}", json!({ "src": r.data_source, "id": r.record_id })),
            Self::Entity { id } => write!(f, "{}", id),
        }
    }
}

impl std::str::FromStr for EntityIdentifier {
    type Err = ParseIdentifierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Text is neither an entity id nor a record reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseIdentifierError;

impl std::fmt::Display for ParseIdentifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed entity identifier")
    }
}

impl std::error::Error for ParseIdentifierError {}

/// True iff every identifier in the list is the same variant
pub fn check_consistent(ids: &[EntityIdentifier]) -> bool {
    match ids.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|id| id.kind() == first.kind()),
    }
}

/// Parse every value of a repeatable parameter
pub fn parse_all(parameter: &str, values: &[String]) -> Result<Vec<EntityIdentifier>> {
    values
        .iter()
        .map(|v| EntityIdentifier::parse_param(parameter, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_text_is_entity_id() {
        assert_eq!(EntityIdentifier::parse("1001"), Ok(EntityIdentifier::entity(1001)));
        assert_eq!(EntityIdentifier::parse(" -5 "), Ok(EntityIdentifier::entity(-5)));
    }

    #[test]
    fn test_composite_text_is_record() {
        let id = EntityIdentifier::parse("CUSTOMERS:1001").unwrap();
        assert_eq!(id, EntityIdentifier::record("CUSTOMERS", "1001"));
        assert_eq!(id.kind(), IdentifierKind::Record);

        // only the first colon delimits
        let id = EntityIdentifier::parse("WATCHLIST:A:B").unwrap();
        assert_eq!(id, EntityIdentifier::record("WATCHLIST", "A:B"));
    }

    #[test]
    fn test_json_forms() {
        assert_eq!(
            EntityIdentifier::parse(r#"{"src":"CUSTOMERS","id":"1001"}"#),
            Ok(EntityIdentifier::record("CUSTOMERS", "1001"))
        );
        assert_eq!(
            EntityIdentifier::parse(r#"{"DATA_SOURCE":"VIPS","RECORD_ID":7}"#),
            Ok(EntityIdentifier::record("VIPS", "7"))
        );
        assert_eq!(
            EntityIdentifier::parse(r#"{"ENTITY_ID":42}"#),
            Ok(EntityIdentifier::entity(42))
        );
        assert_eq!(
            EntityIdentifier::parse(r#"{"entityId":42}"#),
            Ok(EntityIdentifier::entity(42))
        );
    }

    #[test]
    fn test_malformed() {
        for text in ["", "   ", "nocolon", ":1001", "CUSTOMERS:", "{", r#"{"src":"A"}"#, "[1]"] {
            assert!(EntityIdentifier::parse(text).is_err(), "accepted {:?}", text);
        }
    }

    #[test]
    fn test_canonical_text_round_trips() {
        for text in ["1", "-17", "9223372036854775807", "CUSTOMERS:1001", "WATCHLIST:A:B"] {
            let id = EntityIdentifier::parse(text).unwrap();
            assert_eq!(id.to_string(), text);
            assert_eq!(EntityIdentifier::parse(&id.to_string()).unwrap(), id);
        }

        for json in [r#"{"src":"A:B","id":"1"}"#, r#"{"src":"{A","id":"1"}"#] {
            let id = EntityIdentifier::parse(json).unwrap();
            let text = id.to_string();
            assert!(text.starts_with('{'), "{}", text);
            assert_eq!(EntityIdentifier::parse(&text).unwrap(), id);
        }
        assert_eq!(
            EntityIdentifier::parse(r#"{"src":"A:B","id":"1"}"#).unwrap(),
            EntityIdentifier::record("A:B", "1")
        );
    }

    #[test]
    fn test_check_consistent() {
        let rec = EntityIdentifier::record("CUSTOMERS", "1");
        let ent = EntityIdentifier::entity(1);

        assert!(check_consistent(&[]));
        assert!(check_consistent(&[rec.clone()]));
        assert!(check_consistent(&[ent.clone(), EntityIdentifier::entity(2)]));
        assert!(!check_consistent(&[ent.clone(), rec.clone()]));
        assert!(!check_consistent(&[rec.clone(), rec, ent]));
    }

    #[test]
    fn test_parse_param_names_parameter() {
        let err = EntityIdentifier::parse_param("from", "bogus").unwrap_err();
        match err {
            Error::MalformedIdentifier { parameter, value } => {
                assert_eq!(parameter, "from");
                assert_eq!(value, "bogus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_native_json() {
        assert_eq!(
            EntityIdentifier::record("A", "1").to_native_json(),
            json!({"DATA_SOURCE": "A", "RECORD_ID": "1"})
        );
        assert_eq!(EntityIdentifier::entity(3).to_native_json(), json!({"ENTITY_ID": 3}));
    }
}
