//! Resolution engine call interface and native argument encodings
//!
//! The engine is an external collaborator reached through a narrow,
//! synchronous handle. Every call returns a status code (zero on success)
//! and writes its JSON document into the supplied buffer. On failure the
//! diagnostic is read back through `last_exception`.

use serde_json::json;

use crate::identifier::{EntityIdentifier, IdentifierKind};

/// Flag asking the engine to route around avoided entities when it can,
/// instead of forbidding them outright
pub const FIND_PATH_PREFER_EXCLUDE: i64 = 1;

/// Engine flags for an excluding or including-source path call
pub fn path_flags(forbid_avoided: bool) -> i64 {
    if forbid_avoided {
        0
    } else {
        FIND_PATH_PREFER_EXCLUDE
    }
}

/// Handle to an entity resolution engine
///
/// Implementations must be safe to call from several worker threads at
/// once; any internal serialization is the engine's business.
pub trait ResolutionEngine: Send + Sync {
    fn find_path_by_record_id(
        &self,
        data_source1: &str,
        record_id1: &str,
        data_source2: &str,
        record_id2: &str,
        max_degrees: u32,
        response: &mut String,
    ) -> i32;

    #[allow(clippy::too_many_arguments)]
    fn find_path_excluding_by_record_id(
        &self,
        data_source1: &str,
        record_id1: &str,
        data_source2: &str,
        record_id2: &str,
        max_degrees: u32,
        excluded_records: &str,
        flags: i64,
        response: &mut String,
    ) -> i32;

    #[allow(clippy::too_many_arguments)]
    fn find_path_including_source_by_record_id(
        &self,
        data_source1: &str,
        record_id1: &str,
        data_source2: &str,
        record_id2: &str,
        max_degrees: u32,
        excluded_records: &str,
        required_sources: &str,
        flags: i64,
        response: &mut String,
    ) -> i32;

    fn find_path_by_entity_id(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        response: &mut String,
    ) -> i32;

    fn find_path_excluding_by_entity_id(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        excluded_entities: &str,
        flags: i64,
        response: &mut String,
    ) -> i32;

    #[allow(clippy::too_many_arguments)]
    fn find_path_including_source_by_entity_id(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        excluded_entities: &str,
        required_sources: &str,
        flags: i64,
        response: &mut String,
    ) -> i32;

    fn find_network_by_record_id(
        &self,
        record_list: &str,
        max_degrees: u32,
        build_out: u32,
        max_entities: u32,
        response: &mut String,
    ) -> i32;

    fn find_network_by_entity_id(
        &self,
        entity_list: &str,
        max_degrees: u32,
        build_out: u32,
        max_entities: u32,
        response: &mut String,
    ) -> i32;

    /// Diagnostic text for the last failed call on this thread
    fn last_exception(&self) -> String;

    /// Error code for the last failed call on this thread
    fn last_exception_code(&self) -> i32;
}

/// Encode identifiers the way the engine expects them.
///
/// Record references become `{"RECORDS":[...]}`, entity ids become
/// `{"ENTITIES":[...]}`. The caller guarantees a uniform list; `kind`
/// decides the wrapper when the list is empty.
pub fn encode_identifiers(kind: IdentifierKind, ids: &[EntityIdentifier]) -> String {
    let items: Vec<_> = ids.iter().map(EntityIdentifier::to_native_json).collect();
    let doc = match kind {
        IdentifierKind::Record => json!({ "RECORDS": items }),
        IdentifierKind::Entity => json!({ "ENTITIES": items }),
    };
    doc.to_string()
}

/// Encode a data source filter as `{"DATA_SOURCES":[...]}`
pub fn encode_data_sources<'a>(sources: impl IntoIterator<Item = &'a String>) -> String {
    let sources: Vec<&String> = sources.into_iter().collect();
    json!({ "DATA_SOURCES": sources }).to_string()
}
