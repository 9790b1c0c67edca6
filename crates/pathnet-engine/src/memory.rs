//! In-memory resolution engine over a fixture graph
//!
//! Paths are found with breadth-first search bounded by the requested
//! degrees of separation. Relationships are undirected.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;

use chrono::{DateTime, Utc};
use pathnet_core::{NativeApiInfo, RecordRef, ResolutionEngine, FIND_PATH_PREFER_EXCLUDE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::fixture::{Fixture, FixtureEntity, FixtureRelationship};

thread_local! {
    static LAST_ERROR: RefCell<Option<(i32, String)>> = const { RefCell::new(None) };
}

// ─────────────────────────────────────────────────────────────────────────
// Argument documents
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct IdList {
    #[serde(default)]
    entities: Vec<EntityArg>,
    #[serde(default)]
    records: Vec<RecordArg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct EntityArg {
    entity_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RecordArg {
    data_source: String,
    record_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SourceList {
    #[serde(default)]
    data_sources: Vec<String>,
}

fn parse_arg<T: DeserializeOwned + Default>(name: &str, text: &str) -> EngineResult<T> {
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(text).map_err(|e| EngineError::InvalidArgument(format!("{}: {}", name, e)))
}

// ─────────────────────────────────────────────────────────────────────────
// Result documents
// ─────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ResultDoc<'a> {
    entity_paths: Vec<PathDoc>,
    entities: Vec<EntityDoc<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_entity_limit_reached: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct PathDoc {
    start_entity_id: i64,
    end_entity_id: i64,
    entities: Vec<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct EntityDoc<'a> {
    resolved_entity: ResolvedDoc<'a>,
    related_entities: Vec<RelatedDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ResolvedDoc<'a> {
    entity_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_name: Option<&'a str>,
    features: BTreeMap<&'a str, Vec<FeatureDoc<'a>>>,
    records: Vec<RecordDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct FeatureDoc<'a> {
    feat_desc: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage_type: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RecordDoc<'a> {
    data_source: &'a str,
    record_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RelatedDoc<'a> {
    entity_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_name: Option<&'a str>,
    match_level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_key: Option<&'a str>,
    is_disclosed: u8,
    is_ambiguous: u8,
}

// ─────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────

type SearchState = (i64, bool);

/// Resolution engine answering from an in-memory entity graph
pub struct MemoryEngine {
    entities: BTreeMap<i64, FixtureEntity>,
    relationships: Vec<FixtureRelationship>,
    /// Relationship indices per entity, ordered by the related entity's id
    adjacency: HashMap<i64, Vec<usize>>,
    records: HashMap<RecordRef, i64>,
    data_sources: BTreeSet<String>,
    loaded_at: DateTime<Utc>,
}

impl MemoryEngine {
    /// Build an engine from a validated fixture
    pub fn new(fixture: Fixture) -> EngineResult<Self> {
        fixture.validate()?;

        let mut data_sources: BTreeSet<String> = fixture.data_sources.into_iter().collect();
        let mut records = HashMap::new();
        let mut entities = BTreeMap::new();
        for entity in fixture.entities {
            for record in &entity.records {
                data_sources.insert(record.data_source.clone());
                records.insert(record.clone(), entity.entity_id);
            }
            entities.insert(entity.entity_id, entity);
        }

        let relationships = fixture.relationships;
        let mut adjacency: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, rel) in relationships.iter().enumerate() {
            adjacency.entry(rel.from).or_default().push(index);
            adjacency.entry(rel.to).or_default().push(index);
        }
        for (id, edges) in adjacency.iter_mut() {
            edges.sort_by_key(|&i| other_end(&relationships[i], *id));
        }

        tracing::info!(
            "Memory engine ready: {} entities, {} relationships, {} data sources",
            entities.len(),
            relationships.len(),
            data_sources.len()
        );

        Ok(Self {
            entities,
            relationships,
            adjacency,
            records,
            data_sources,
            loaded_at: Utc::now(),
        })
    }

    /// Load a fixture file and build an engine from it
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        Self::new(Fixture::load(path)?)
    }

    /// Every data source registered in the fixture or referenced by a record
    pub fn data_sources(&self) -> &BTreeSet<String> {
        &self.data_sources
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Version details reported in response metadata
    pub fn native_api_info(&self) -> NativeApiInfo {
        let version = env!("CARGO_PKG_VERSION");
        NativeApiInfo {
            native_api_version: version.to_string(),
            native_api_build_version: format!("{}-memory", version),
            native_api_build_number: self.loaded_at.format("%Y_%m_%d__%H_%M").to_string(),
            native_api_build_date: self.loaded_at,
            config_compatibility_version: "1".to_string(),
        }
    }

    fn neighbors(&self, id: i64) -> impl Iterator<Item = (i64, &FixtureRelationship)> + '_ {
        self.adjacency.get(&id).into_iter().flatten().map(move |&index| {
            let rel = &self.relationships[index];
            (other_end(rel, id), rel)
        })
    }

    fn has_source(&self, id: i64, sources: &BTreeSet<String>) -> bool {
        self.entities
            .get(&id)
            .map(|e| e.records.iter().any(|r| sources.contains(&r.data_source)))
            .unwrap_or(false)
    }

    fn entity(&self, id: i64) -> EngineResult<i64> {
        if self.entities.contains_key(&id) {
            Ok(id)
        } else {
            Err(EngineError::UnknownEntity(id))
        }
    }

    fn resolve_record(&self, data_source: &str, record_id: &str) -> EngineResult<i64> {
        self.records
            .get(&RecordRef::new(data_source, record_id))
            .copied()
            .ok_or_else(|| EngineError::UnknownRecord {
                data_source: data_source.to_string(),
                record_id: record_id.to_string(),
            })
    }

    fn resolve_list(&self, list: IdList) -> EngineResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(list.entities.len() + list.records.len());
        for arg in list.entities {
            ids.push(self.entity(arg.entity_id)?);
        }
        for arg in list.records {
            ids.push(self.resolve_record(&arg.data_source, &arg.record_id)?);
        }
        Ok(ids)
    }

    /// BFS over (entity, source-requirement-met) states.
    ///
    /// Avoided entities are never entered unless they are the end point.
    /// Paths are kept simple: a state never re-enters an entity already on
    /// its own path.
    fn shortest_path(
        &self,
        start: i64,
        end: i64,
        max_degrees: u32,
        avoided: &HashSet<i64>,
        required: Option<&BTreeSet<String>>,
    ) -> Option<Vec<i64>> {
        let satisfied = |id: i64, before: bool| before || required.map_or(true, |s| self.has_source(id, s));

        let origin: SearchState = (start, satisfied(start, false));
        let mut parent: HashMap<SearchState, SearchState> = HashMap::new();
        let mut visited: HashSet<SearchState> = HashSet::from([origin]);
        let mut queue: VecDeque<(SearchState, u32)> = VecDeque::from([(origin, 0)]);

        while let Some((state, depth)) = queue.pop_front() {
            if state == (end, true) {
                tracing::debug!("BFS found path {} -> {} at depth {}", start, end, depth);
                return Some(reconstruct(origin, state, &parent));
            }
            if depth >= max_degrees {
                continue;
            }

            for (next, _) in self.neighbors(state.0) {
                if next != end && avoided.contains(&next) {
                    continue;
                }
                if on_path(state, next, &parent) {
                    continue;
                }
                let next_state = (next, satisfied(next, state.1));
                if visited.insert(next_state) {
                    parent.insert(next_state, state);
                    queue.push_back((next_state, depth + 1));
                }
            }
        }
        None
    }

    /// Apply the avoidance flags: hard exclusion, or prefer-exclude with a
    /// fallback search that admits avoided entities
    fn constrained_path(
        &self,
        start: i64,
        end: i64,
        max_degrees: u32,
        avoided: &HashSet<i64>,
        flags: i64,
        required: Option<&BTreeSet<String>>,
    ) -> Option<Vec<i64>> {
        let path = self.shortest_path(start, end, max_degrees, avoided, required);
        if path.is_some() || avoided.is_empty() || flags & FIND_PATH_PREFER_EXCLUDE == 0 {
            return path;
        }
        tracing::debug!("No path avoiding {:?}; retrying with avoided entities allowed", avoided);
        self.shortest_path(start, end, max_degrees, &HashSet::new(), required)
    }

    fn entity_doc(&self, id: i64) -> Option<EntityDoc<'_>> {
        let entity = self.entities.get(&id)?;
        let features = entity
            .features
            .iter()
            .map(|(name, values)| {
                let values: Vec<FeatureDoc<'_>> = values
                    .iter()
                    .map(|f| FeatureDoc {
                        feat_desc: &f.value,
                        usage_type: f.usage_type.as_deref(),
                    })
                    .collect();
                (name.as_str(), values)
            })
            .collect();
        let records = entity
            .records
            .iter()
            .map(|r| RecordDoc {
                data_source: &r.data_source,
                record_id: &r.record_id,
            })
            .collect();
        let related_entities = self
            .neighbors(id)
            .map(|(other, rel)| RelatedDoc {
                entity_id: other,
                entity_name: self.entities.get(&other).and_then(|e| e.entity_name.as_deref()),
                match_level: rel.match_level,
                match_key: rel.match_key.as_deref(),
                is_disclosed: u8::from(rel.disclosed),
                is_ambiguous: u8::from(rel.ambiguous),
            })
            .collect();

        Some(EntityDoc {
            resolved_entity: ResolvedDoc {
                entity_id: id,
                entity_name: entity.entity_name.as_deref(),
                features,
                records,
            },
            related_entities,
        })
    }

    fn render(&self, paths: Vec<PathDoc>, ids: &[i64], limit_reached: Option<bool>) -> EngineResult<String> {
        let doc = ResultDoc {
            entity_paths: paths,
            entities: ids.iter().filter_map(|id| self.entity_doc(*id)).collect(),
            max_entity_limit_reached: limit_reached,
        };
        Ok(serde_json::to_string(&doc)?)
    }

    fn path_document(
        &self,
        start: i64,
        end: i64,
        max_degrees: u32,
        excluded: &str,
        required_sources: Option<&str>,
        flags: i64,
    ) -> EngineResult<String> {
        let avoided: HashSet<i64> = self
            .resolve_list(parse_arg("excluded", excluded)?)?
            .into_iter()
            .collect();
        let required = required_sources
            .map(|text| parse_arg::<SourceList>("required sources", text))
            .transpose()?
            .map(|list| list.data_sources.into_iter().collect::<BTreeSet<_>>());

        let path = self
            .constrained_path(start, end, max_degrees, &avoided, flags, required.as_ref())
            .unwrap_or_default();

        let shown = if path.is_empty() {
            let mut ends = vec![start];
            if end != start {
                ends.push(end);
            }
            ends
        } else {
            path.clone()
        };

        let paths = vec![PathDoc {
            start_entity_id: start,
            end_entity_id: end,
            entities: path,
        }];
        self.render(paths, &shown, None)
    }

    fn network_document(
        &self,
        members: Vec<i64>,
        max_degrees: u32,
        build_out: u32,
        max_entities: u32,
    ) -> EngineResult<String> {
        let mut seen: HashSet<i64> = HashSet::new();
        let members: Vec<i64> = members.into_iter().filter(|id| seen.insert(*id)).collect();
        let mut included = members.clone();

        let mut paths = Vec::new();
        let unfiltered = HashSet::new();
        for (i, &start) in members.iter().enumerate() {
            for &end in &members[i + 1..] {
                let path = self
                    .shortest_path(start, end, max_degrees, &unfiltered, None)
                    .unwrap_or_default();
                for &id in &path {
                    if seen.insert(id) {
                        included.push(id);
                    }
                }
                paths.push(PathDoc {
                    start_entity_id: start,
                    end_entity_id: end,
                    entities: path,
                });
            }
        }

        let cap = max_entities as usize;
        let mut limit_reached = false;
        let mut frontier = included.clone();
        'build: for _ in 0..build_out {
            let mut next_frontier = Vec::new();
            for &id in &frontier {
                for (next, _) in self.neighbors(id) {
                    if seen.contains(&next) {
                        continue;
                    }
                    if included.len() >= cap {
                        limit_reached = true;
                        break 'build;
                    }
                    seen.insert(next);
                    included.push(next);
                    next_frontier.push(next);
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        tracing::debug!(
            "Network of {} members: {} paths, {} entities, limit reached: {}",
            members.len(),
            paths.len(),
            included.len(),
            limit_reached
        );
        self.render(paths, &included, Some(limit_reached))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_path(
        &self,
        data_source1: &str,
        record_id1: &str,
        data_source2: &str,
        record_id2: &str,
        max_degrees: u32,
        excluded: &str,
        required_sources: Option<&str>,
        flags: i64,
    ) -> EngineResult<String> {
        let start = self.resolve_record(data_source1, record_id1)?;
        let end = self.resolve_record(data_source2, record_id2)?;
        self.path_document(start, end, max_degrees, excluded, required_sources, flags)
    }

    fn entity_path(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        excluded: &str,
        required_sources: Option<&str>,
        flags: i64,
    ) -> EngineResult<String> {
        let start = self.entity(entity_id1)?;
        let end = self.entity(entity_id2)?;
        self.path_document(start, end, max_degrees, excluded, required_sources, flags)
    }

    fn network(
        &self,
        list: &str,
        max_degrees: u32,
        build_out: u32,
        max_entities: u32,
    ) -> EngineResult<String> {
        let members = self.resolve_list(parse_arg("entity list", list)?)?;
        self.network_document(members, max_degrees, build_out, max_entities)
    }

    fn complete(call: &str, outcome: EngineResult<String>, response: &mut String) -> i32 {
        response.clear();
        match outcome {
            Ok(doc) => {
                LAST_ERROR.with(|last| *last.borrow_mut() = None);
                response.push_str(&doc);
                0
            }
            Err(error) => {
                tracing::debug!("{} failed: {}", call, error);
                let code = error.code();
                LAST_ERROR.with(|last| *last.borrow_mut() = Some((code, error.to_string())));
                -2
            }
        }
    }
}

fn other_end(rel: &FixtureRelationship, id: i64) -> i64 {
    if rel.from == id {
        rel.to
    } else {
        rel.from
    }
}

fn on_path(mut state: SearchState, id: i64, parent: &HashMap<SearchState, SearchState>) -> bool {
    loop {
        if state.0 == id {
            return true;
        }
        match parent.get(&state) {
            Some(prev) => state = *prev,
            None => return false,
        }
    }
}

fn reconstruct(origin: SearchState, goal: SearchState, parent: &HashMap<SearchState, SearchState>) -> Vec<i64> {
    let mut path = vec![goal.0];
    let mut state = goal;
    while state != origin {
        match parent.get(&state) {
            Some(prev) => {
                state = *prev;
                path.push(state.0);
            }
            None => break,
        }
    }
    path.reverse();
    path
}

impl ResolutionEngine for MemoryEngine {
    fn find_path_by_record_id(
        &self,
        data_source1: &str,
        record_id1: &str,
        data_source2: &str,
        record_id2: &str,
        max_degrees: u32,
        response: &mut String,
    ) -> i32 {
        let outcome = self.record_path(data_source1, record_id1, data_source2, record_id2, max_degrees, "", None, 0);
        Self::complete("findPathByRecordID", outcome, response)
    }

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
    ) -> i32 {
        let outcome = self.record_path(
            data_source1,
            record_id1,
            data_source2,
            record_id2,
            max_degrees,
            excluded_records,
            None,
            flags,
        );
        Self::complete("findPathExcludingByRecordID", outcome, response)
    }

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
    ) -> i32 {
        let outcome = self.record_path(
            data_source1,
            record_id1,
            data_source2,
            record_id2,
            max_degrees,
            excluded_records,
            Some(required_sources),
            flags,
        );
        Self::complete("findPathIncludingSourceByRecordID", outcome, response)
    }

    fn find_path_by_entity_id(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        response: &mut String,
    ) -> i32 {
        let outcome = self.entity_path(entity_id1, entity_id2, max_degrees, "", None, 0);
        Self::complete("findPathByEntityID", outcome, response)
    }

    fn find_path_excluding_by_entity_id(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        excluded_entities: &str,
        flags: i64,
        response: &mut String,
    ) -> i32 {
        let outcome = self.entity_path(entity_id1, entity_id2, max_degrees, excluded_entities, None, flags);
        Self::complete("findPathExcludingByEntityID", outcome, response)
    }

    fn find_path_including_source_by_entity_id(
        &self,
        entity_id1: i64,
        entity_id2: i64,
        max_degrees: u32,
        excluded_entities: &str,
        required_sources: &str,
        flags: i64,
        response: &mut String,
    ) -> i32 {
        let outcome = self.entity_path(
            entity_id1,
            entity_id2,
            max_degrees,
            excluded_entities,
            Some(required_sources),
            flags,
        );
        Self::complete("findPathIncludingSourceByEntityID", outcome, response)
    }

    fn find_network_by_record_id(
        &self,
        record_list: &str,
        max_degrees: u32,
        build_out: u32,
        max_entities: u32,
        response: &mut String,
    ) -> i32 {
        let outcome = self.network(record_list, max_degrees, build_out, max_entities);
        Self::complete("findNetworkByRecordID", outcome, response)
    }

    fn find_network_by_entity_id(
        &self,
        entity_list: &str,
        max_degrees: u32,
        build_out: u32,
        max_entities: u32,
        response: &mut String,
    ) -> i32 {
        let outcome = self.network(entity_list, max_degrees, build_out, max_entities);
        Self::complete("findNetworkByEntityID", outcome, response)
    }

    fn last_exception(&self) -> String {
        LAST_ERROR.with(|last| last.borrow().as_ref().map(|(_, m)| m.clone()).unwrap_or_default())
    }

    fn last_exception_code(&self) -> i32 {
        LAST_ERROR.with(|last| last.borrow().as_ref().map(|(c, _)| *c).unwrap_or_default())
    }
}
