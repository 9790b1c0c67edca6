//! Selection and invocation of engine call variants
//!
//! Path calls are chosen from a 2x3 table keyed by identifier kind and
//! filter mode; network calls from a two-entry table keyed by kind.

use crate::engine::{encode_data_sources, encode_identifiers, path_flags, ResolutionEngine};
use crate::error::{Error, Result};
use crate::identifier::{IdentifierKind, RecordRef};
use crate::request::{NetworkRequest, PathRequest};
use crate::timers::Timers;

/// Which optional path filters are in play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Neither avoid-list nor source filter
    Unfiltered,
    /// Avoid-list only
    Excluding,
    /// Source filter, with or without an avoid-list
    IncludingSource,
}

impl FilterMode {
    pub fn select(has_avoid_list: bool, has_source_filter: bool) -> Self {
        match (has_avoid_list, has_source_filter) {
            (_, true) => Self::IncludingSource,
            (true, false) => Self::Excluding,
            (false, false) => Self::Unfiltered,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Unfiltered => 0,
            Self::Excluding => 1,
            Self::IncludingSource => 2,
        }
    }
}

/// The six engine path call variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathCall {
    PathByRecordId,
    PathExcludingByRecordId,
    PathIncludingSourceByRecordId,
    PathByEntityId,
    PathExcludingByEntityId,
    PathIncludingSourceByEntityId,
}

const PATH_CALLS: [[PathCall; 3]; 2] = [
    [
        PathCall::PathByRecordId,
        PathCall::PathExcludingByRecordId,
        PathCall::PathIncludingSourceByRecordId,
    ],
    [
        PathCall::PathByEntityId,
        PathCall::PathExcludingByEntityId,
        PathCall::PathIncludingSourceByEntityId,
    ],
];

impl PathCall {
    pub fn select(kind: IdentifierKind, mode: FilterMode) -> Self {
        PATH_CALLS[kind.index()][mode.index()]
    }

    pub fn for_request(request: &PathRequest) -> Self {
        Self::select(
            request.kind(),
            FilterMode::select(
                request.avoid_entities.is_some(),
                request.with_sources.is_some(),
            ),
        )
    }

    /// Engine function name, used for timer labels and logs
    pub fn name(self) -> &'static str {
        match self {
            Self::PathByRecordId => "findPathByRecordID",
            Self::PathExcludingByRecordId => "findPathExcludingByRecordID",
            Self::PathIncludingSourceByRecordId => "findPathIncludingSourceByRecordID",
            Self::PathByEntityId => "findPathByEntityID",
            Self::PathExcludingByEntityId => "findPathExcludingByEntityID",
            Self::PathIncludingSourceByEntityId => "findPathIncludingSourceByEntityID",
        }
    }
}

/// The two engine network call variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkCall {
    NetworkByRecordId,
    NetworkByEntityId,
}

const NETWORK_CALLS: [NetworkCall; 2] = [NetworkCall::NetworkByRecordId, NetworkCall::NetworkByEntityId];

impl NetworkCall {
    pub fn select(kind: IdentifierKind) -> Self {
        NETWORK_CALLS[kind.index()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NetworkByRecordId => "findNetworkByRecordID",
            Self::NetworkByEntityId => "findNetworkByEntityID",
        }
    }
}

fn endpoints(request: &PathRequest) -> Result<(&RecordRef, &RecordRef)> {
    match (request.from.as_record(), request.to.as_record()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(Error::Unexpected(
            "record-keyed call without record identifiers".to_string(),
        )),
    }
}

fn entity_endpoints(request: &PathRequest) -> Result<(i64, i64)> {
    match (request.from.as_entity_id(), request.to.as_entity_id()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(Error::Unexpected(
            "entity-keyed call without entity identifiers".to_string(),
        )),
    }
}

fn check_result<E: ResolutionEngine + ?Sized>(engine: &E, call: &str, code: i32) -> Result<()> {
    if code == 0 {
        return Ok(());
    }
    let error = Error::EngineFailure {
        code: engine.last_exception_code(),
        message: engine.last_exception(),
    };
    tracing::error!("{} returned {}: {}", call, code, error);
    Err(error)
}

/// Invoke the path call variant the request selects; returns the raw document.
///
/// The engine is called exactly once. A non-zero return code becomes
/// `EngineFailure` carrying the engine's own diagnostic.
pub fn find_path<E: ResolutionEngine + ?Sized>(
    engine: &E,
    request: &PathRequest,
    timers: &mut Timers,
) -> Result<String> {
    let call = PathCall::for_request(request);
    let kind = request.kind();
    let avoided = || encode_identifiers(kind, request.avoid_entities.as_deref().unwrap_or_default());
    let sources = || encode_data_sources(request.with_sources.iter().flatten());
    let flags = path_flags(request.forbid_avoided);
    let degrees = request.max_degrees;

    tracing::debug!(
        "Dispatching {}: from={}, to={}, degrees={}, flags={}",
        call.name(),
        request.from,
        request.to,
        degrees,
        flags
    );

    let timer = format!("nativeApi:{}", call.name());
    timers.start("nativeApi")?;
    timers.start(&timer)?;

    let mut buffer = String::new();
    let code = match call {
        PathCall::PathByRecordId => {
            let (a, b) = endpoints(request)?;
            engine.find_path_by_record_id(
                &a.data_source,
                &a.record_id,
                &b.data_source,
                &b.record_id,
                degrees,
                &mut buffer,
            )
        }
        PathCall::PathExcludingByRecordId => {
            let (a, b) = endpoints(request)?;
            engine.find_path_excluding_by_record_id(
                &a.data_source,
                &a.record_id,
                &b.data_source,
                &b.record_id,
                degrees,
                &avoided(),
                flags,
                &mut buffer,
            )
        }
        PathCall::PathIncludingSourceByRecordId => {
            let (a, b) = endpoints(request)?;
            engine.find_path_including_source_by_record_id(
                &a.data_source,
                &a.record_id,
                &b.data_source,
                &b.record_id,
                degrees,
                &avoided(),
                &sources(),
                flags,
                &mut buffer,
            )
        }
        PathCall::PathByEntityId => {
            let (a, b) = entity_endpoints(request)?;
            engine.find_path_by_entity_id(a, b, degrees, &mut buffer)
        }
        PathCall::PathExcludingByEntityId => {
            let (a, b) = entity_endpoints(request)?;
            engine.find_path_excluding_by_entity_id(a, b, degrees, &avoided(), flags, &mut buffer)
        }
        PathCall::PathIncludingSourceByEntityId => {
            let (a, b) = entity_endpoints(request)?;
            engine.find_path_including_source_by_entity_id(
                a,
                b,
                degrees,
                &avoided(),
                &sources(),
                flags,
                &mut buffer,
            )
        }
    };

    timers.stop(&timer)?;
    timers.stop("nativeApi")?;

    check_result(engine, call.name(), code)?;
    Ok(buffer)
}

/// Invoke the network call variant selected by the members' identifier kind
pub fn find_network<E: ResolutionEngine + ?Sized>(
    engine: &E,
    request: &NetworkRequest,
    timers: &mut Timers,
) -> Result<String> {
    let kind = request
        .kind()
        .ok_or_else(|| Error::Unexpected("entity network requested without members".to_string()))?;
    let call = NetworkCall::select(kind);
    let members = encode_identifiers(kind, &request.entities);

    tracing::debug!(
        "Dispatching {}: members={}, degrees={}, buildOut={}, maxEntities={}",
        call.name(),
        request.entities.len(),
        request.max_degrees,
        request.build_out,
        request.max_entities
    );

    let timer = format!("nativeApi:{}", call.name());
    timers.start("nativeApi")?;
    timers.start(&timer)?;

    let mut buffer = String::new();
    let code = match call {
        NetworkCall::NetworkByRecordId => engine.find_network_by_record_id(
            &members,
            request.max_degrees,
            request.build_out,
            request.max_entities,
            &mut buffer,
        ),
        NetworkCall::NetworkByEntityId => engine.find_network_by_entity_id(
            &members,
            request.max_degrees,
            request.build_out,
            request.max_entities,
            &mut buffer,
        ),
    };

    timers.stop(&timer)?;
    timers.stop("nativeApi")?;

    check_result(engine, call.name(), code)?;
    Ok(buffer)
}
