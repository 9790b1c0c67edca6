//! Entity path and network operations: validate, dispatch, assemble

use std::sync::Arc;

use serde_json::value::RawValue;

use crate::dispatch;
use crate::engine::ResolutionEngine;
use crate::error::Result;
use crate::meta::{HttpMethod, ResponseMeta};
use crate::request::{NetworkParams, NetworkRequest, PathParams, PathRequest};
use crate::response::{raw_document, ApiResponse, ErrorResponse, Links, NetworkResponse, PathResponse};
use crate::result::{NetworkResult, PathResult};
use crate::server::ServerInfo;
use crate::timers::Timers;

const PROCESS_RESULTS: &str = "processResults";

/// Runs entity-graph queries against a resolution engine.
///
/// Each call validates its parameters completely before the engine is
/// touched, invokes exactly one engine call variant, then parses the result
/// and wraps it in an envelope built from the caller's timers.
pub struct EntityGraphService<E: ?Sized> {
    engine: Arc<E>,
    server: Arc<ServerInfo>,
}

impl<E: ?Sized> Clone for EntityGraphService<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            server: Arc::clone(&self.server),
        }
    }
}

impl<E: ResolutionEngine + ?Sized> EntityGraphService<E> {
    pub fn new(engine: Arc<E>, server: Arc<ServerInfo>) -> Self {
        Self { engine, server }
    }

    pub fn engine(&self) -> &E {
        self.engine.as_ref()
    }

    pub fn server(&self) -> &ServerInfo {
        self.server.as_ref()
    }

    /// Shortest path between two entities
    pub fn find_path(
        &self,
        params: &PathParams,
        self_link: &str,
        mut timers: Timers,
    ) -> std::result::Result<PathResponse, ErrorResponse> {
        let outcome = self.run_path(params, &mut timers);
        self.respond(outcome, self_link, timers)
    }

    /// Network of entities around the requested members
    pub fn find_network(
        &self,
        params: &NetworkParams,
        self_link: &str,
        mut timers: Timers,
    ) -> std::result::Result<NetworkResponse, ErrorResponse> {
        let outcome = self.run_network(params, &mut timers);
        self.respond(outcome, self_link, timers)
    }

    fn run_path(
        &self,
        params: &PathParams,
        timers: &mut Timers,
    ) -> Result<(PathResult, Option<Box<RawValue>>)> {
        let request = PathRequest::from_params(params, &self.server)?;
        tracing::debug!("Validated path request: {} -> {}", request.from, request.to);

        let raw = dispatch::find_path(self.engine.as_ref(), &request, timers)?;

        timers.start(PROCESS_RESULTS)?;
        let data = PathResult::parse(&raw, self.server.classifier())?;
        let raw = request.with_raw.then(|| raw_document(raw)).transpose()?;
        timers.stop(PROCESS_RESULTS)?;

        Ok((data, raw))
    }

    fn run_network(
        &self,
        params: &NetworkParams,
        timers: &mut Timers,
    ) -> Result<(NetworkResult, Option<Box<RawValue>>)> {
        let request = NetworkRequest::from_params(params)?;
        tracing::debug!("Validated network request: {} members", request.entities.len());

        let raw = dispatch::find_network(self.engine.as_ref(), &request, timers)?;

        timers.start(PROCESS_RESULTS)?;
        let data = NetworkResult::parse(&raw, self.server.classifier())?;
        let raw = request.with_raw.then(|| raw_document(raw)).transpose()?;
        timers.stop(PROCESS_RESULTS)?;

        Ok((data, raw))
    }

    fn respond<T>(
        &self,
        outcome: Result<(T, Option<Box<RawValue>>)>,
        self_link: &str,
        timers: Timers,
    ) -> std::result::Result<ApiResponse<T>, ErrorResponse> {
        let native_api = self.server.native_api();
        match outcome {
            Ok((data, raw_data)) => {
                let meta = ResponseMeta::new(HttpMethod::Get, 200, timers, native_api);
                let mut response = ApiResponse::new(data, Links::new(self_link), meta);
                response.raw_data = raw_data;
                Ok(response)
            }
            Err(error) => {
                if error.is_client_error() {
                    tracing::warn!("Rejected {}: {}", self_link, error);
                }
                Err(ErrorResponse::new(HttpMethod::Get, error, self_link, timers, native_api))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::RecordingEngine;
    use crate::error::Error;

    const TWO_HOP: &str = r#"{
        "ENTITY_PATHS": [{"START_ENTITY_ID": 1, "END_ENTITY_ID": 2, "ENTITIES": [1, 2]}],
        "ENTITIES": [
            {"RESOLVED_ENTITY": {"ENTITY_ID": 1, "ENTITY_NAME": "John Smith",
                "RECORDS": [{"DATA_SOURCE": "CUSTOMERS", "RECORD_ID": "1001"}]},
             "RELATED_ENTITIES": [{"ENTITY_ID": 2, "MATCH_LEVEL": 3, "MATCH_KEY": "+PHONE"}]},
            {"RESOLVED_ENTITY": {"ENTITY_ID": 2, "ENTITY_NAME": "Jane Smith",
                "RECORDS": [{"DATA_SOURCE": "CUSTOMERS", "RECORD_ID": "1002"}]},
             "RELATED_ENTITIES": [{"ENTITY_ID": 1, "MATCH_LEVEL": 3, "MATCH_KEY": "+PHONE"}]}
        ]
    }"#;

    fn service(engine: RecordingEngine) -> (EntityGraphService<RecordingEngine>, Arc<RecordingEngine>) {
        let engine = Arc::new(engine);
        let server = Arc::new(ServerInfo::new(["CUSTOMERS", "WATCHLIST"]));
        (EntityGraphService::new(Arc::clone(&engine), server), engine)
    }

    #[test]
    fn test_record_path_end_to_end() {
        let (service, engine) = service(RecordingEngine::answering(TWO_HOP));
        let params = PathParams::new("CUSTOMERS:1001", "CUSTOMERS:1002");

        let response = service
            .find_path(&params, "/entity-paths", Timers::started(&["overall"]))
            .unwrap();

        assert_eq!(engine.call_names(), vec!["findPathByRecordID"]);
        assert_eq!(response.data.entities.len(), 2);
        assert_eq!(response.meta.http_status_code(), 200);
        assert!(response.raw_data.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("rawData").is_none());
        let timings = &json["meta"]["timings"];
        assert!(timings["overall"].is_u64());
        assert!(timings["nativeApi:findPathByRecordID"].is_u64());
        assert!(timings["processResults"].is_u64());
    }

    #[test]
    fn test_prefixed_record_text_splits_at_first_colon() {
        let (service, engine) = service(RecordingEngine::answering(TWO_HOP));
        let params = PathParams::new("RECORD:CUSTOMERS:1001", "RECORD:CUSTOMERS:1002");

        let response = service.find_path(&params, "/entity-paths", Timers::new()).unwrap();

        assert_eq!(engine.call_names(), vec!["findPathByRecordID"]);
        let args = engine.args(0);
        assert_eq!(&args[..4], ["RECORD", "CUSTOMERS:1001", "RECORD", "CUSTOMERS:1002"]);
        assert_eq!(response.meta.http_status_code(), 200);
        assert!(response.raw_data.is_none());
        assert!(serde_json::to_value(&response).unwrap().get("rawData").is_none());
    }

    #[test]
    fn test_with_raw_attaches_engine_document() {
        let (service, _) = service(RecordingEngine::answering(TWO_HOP));
        let params = PathParams::new("1", "2").with_raw();

        let response = service.find_path(&params, "/entity-paths", Timers::new()).unwrap();
        let raw = response.raw_data.as_ref().unwrap();
        assert_eq!(raw.get(), TWO_HOP);
    }

    #[test]
    fn test_unknown_source_never_reaches_engine() {
        let (service, engine) = service(RecordingEngine::answering(TWO_HOP));
        let params = PathParams::new("CUSTOMERS:1001", "CUSTOMERS:1002").with_source("UNKNOWN_SOURCE");

        let failure = service.find_path(&params, "/entity-paths", Timers::new()).unwrap_err();
        assert_eq!(failure.status(), 400);
        assert!(failure.errors[0].message.contains("UNKNOWN_SOURCE"));
        assert!(engine.call_names().is_empty());
    }

    #[test]
    fn test_mixed_avoid_list_never_reaches_engine() {
        let (service, engine) = service(RecordingEngine::answering(TWO_HOP));
        let params = PathParams::new("1", "2").avoiding("3").avoiding("CUSTOMERS:1003");

        let failure = service.find_path(&params, "/entity-paths", Timers::new()).unwrap_err();
        assert_eq!(failure.status(), 400);
        assert!(matches!(failure.error(), Error::InconsistentIdentifierTypes { .. }));
        assert!(engine.call_names().is_empty());
    }

    #[test]
    fn test_engine_failure_is_server_error() {
        let (service, engine) = service(RecordingEngine::failing(33, "Unknown record: 'CUSTOMERS' '9'"));
        let params = NetworkParams::new(["CUSTOMERS:9"]);

        let failure = service.find_network(&params, "/entity-networks", Timers::new()).unwrap_err();
        assert_eq!(failure.status(), 500);
        assert_eq!(failure.errors[0].code, Some(33));
        assert_eq!(engine.call_names(), vec!["findNetworkByRecordID"]);
    }

    #[test]
    fn test_unparseable_engine_document_is_server_error() {
        let (service, _) = service(RecordingEngine::answering("not json"));
        let failure = service
            .find_path(&PathParams::new("1", "2"), "/entity-paths", Timers::new())
            .unwrap_err();
        assert_eq!(failure.status(), 500);
        assert!(matches!(failure.error(), Error::Unexpected(_)));
    }

    #[test]
    fn test_network_response() {
        let (service, engine) = service(RecordingEngine::answering(TWO_HOP));
        let params = NetworkParams::new(["1", "2"]).with_build_out(0);

        let response = service.find_network(&params, "/entity-networks", Timers::new()).unwrap();
        assert_eq!(engine.call_names(), vec!["findNetworkByEntityID"]);
        assert_eq!(engine.args(0)[2], "0");
        assert_eq!(response.data.entity_paths.len(), 1);
        assert!(!response.data.max_entity_limit_reached);
    }
}
