//! HTTP server: routes, worker pool and response rendering

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, RawQuery, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use pathnet_core::{
    ApiResponse, EntityGraphService, Error, ErrorResponse, HttpMethod, ResolutionEngine, Timers,
};

use crate::query::QueryParams;

/// Maximum request body size (64KB); every route is a GET
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Default number of requests served concurrently
pub const DEFAULT_CONCURRENCY: usize = 8;

type Outcome<T> = std::result::Result<ApiResponse<T>, ErrorResponse>;

/// Shared state: the service and the worker slots it runs on
#[derive(Clone)]
pub struct AppState {
    service: EntityGraphService<dyn ResolutionEngine>,
    workers: Arc<Semaphore>,
}

impl AppState {
    pub fn new(service: EntityGraphService<dyn ResolutionEngine>, concurrency: usize) -> Self {
        Self {
            service,
            workers: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    fn failure(&self, error: Error, self_link: &str, timers: Timers) -> ErrorResponse {
        ErrorResponse::new(
            HttpMethod::Get,
            error,
            self_link,
            timers,
            self.service.server().native_api(),
        )
    }

    /// Wait for a worker slot, then run `job` on the blocking pool.
    ///
    /// The wait is timed as `enqueued`.
    async fn run<T, F>(&self, mut timers: Timers, self_link: &str, job: F) -> Outcome<T>
    where
        T: Send + 'static,
        F: FnOnce(EntityGraphService<dyn ResolutionEngine>, Timers) -> Outcome<T> + Send + 'static,
    {
        if let Err(e) = timers.start("enqueued") {
            return Err(self.failure(e.into(), self_link, timers));
        }
        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                return Err(self.failure(Error::Unexpected(e.to_string()), self_link, timers));
            }
        };
        if let Err(e) = timers.stop("enqueued") {
            return Err(self.failure(e.into(), self_link, timers));
        }

        let service = self.service.clone();
        let fallback = timers.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(service, timers)
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Worker failed for {}: {}", self_link, e);
                Err(self.failure(
                    Error::Unexpected(format!("worker failed: {}", e)),
                    self_link,
                    fallback,
                ))
            }
        }
    }
}

/// Renders a success or error envelope with its status code
pub struct Reply<T>(pub Outcome<T>);

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(failure) => {
                let status = StatusCode::from_u16(failure.status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(failure)).into_response()
            }
        }
    }
}

/// Create the router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/entity-paths", get(entity_paths))
        .route("/entity-networks", get(entity_networks))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "server": "pathnet",
        "version": pathnet_core::SERVER_VERSION
    }))
}

async fn entity_paths(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Reply<pathnet_core::PathResult> {
    let timers = Timers::started(&["overall"]);
    let self_link = uri.to_string();

    let params = match QueryParams::parse(query.as_deref()).path_params() {
        Ok(params) => params,
        Err(e) => return Reply(Err(state.failure(e, &self_link, timers))),
    };

    let link = self_link.clone();
    let outcome = state
        .run(timers, &self_link, move |service, timers| {
            service.find_path(&params, &link, timers)
        })
        .await;
    Reply(outcome)
}

async fn entity_networks(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Reply<pathnet_core::NetworkResult> {
    let timers = Timers::started(&["overall"]);
    let self_link = uri.to_string();

    let params = match QueryParams::parse(query.as_deref()).network_params() {
        Ok(params) => params,
        Err(e) => return Reply(Err(state.failure(e, &self_link, timers))),
    };

    let link = self_link.clone();
    let outcome = state
        .run(timers, &self_link, move |service, timers| {
            service.find_network(&params, &link, timers)
        })
        .await;
    Reply(outcome)
}

/// Run the HTTP server until the process is stopped
pub async fn run_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("pathnet listening on {}", addr);
    tracing::info!("  Paths: http://{}/entity-paths", addr);
    tracing::info!("  Networks: http://{}/entity-networks", addr);
    tracing::info!("  Health check: http://{}/health", addr);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pathnet_core::ServerInfo;
    use pathnet_engine::{Fixture, MemoryEngine};
    use tower::ServiceExt;

    const GRAPH: &str = r#"{
        "entities": [
            {"entityId": 1, "entityName": "John Smith",
             "records": [{"dataSource": "CUSTOMERS", "recordId": "1001"}],
             "features": {"PHONE": [{"value": "702-555-1212", "usageType": "HOME"}]}},
            {"entityId": 2, "entityName": "Jane Smith",
             "records": [{"dataSource": "CUSTOMERS", "recordId": "1002"}]},
            {"entityId": 3, "entityName": "Joe Schmoe",
             "records": [{"dataSource": "WATCHLIST", "recordId": "W3"}]}
        ],
        "relationships": [
            {"from": 1, "to": 2, "matchLevel": 3, "matchKey": "+PHONE"},
            {"from": 2, "to": 3, "matchLevel": 3, "matchKey": "+ADDRESS"}
        ]
    }"#;

    fn state() -> AppState {
        let engine = MemoryEngine::new(Fixture::parse(GRAPH).unwrap()).unwrap();
        let server = ServerInfo::new(engine.data_sources().iter().cloned())
            .with_native_api(engine.native_api_info());
        let engine: Arc<dyn ResolutionEngine> = Arc::new(engine);
        let service = EntityGraphService::new(engine, Arc::new(server));
        AppState::new(service, 2)
    }

    fn app() -> Router {
        create_router(state())
    }

    #[tokio::test]
    async fn test_worker_failure_keeps_request_timings() {
        let outcome: Outcome<()> = state()
            .run(Timers::started(&["overall"]), "/entity-paths?from=1&to=2", |_, _| {
                panic!("worker exploded")
            })
            .await;

        let failure = outcome.unwrap_err();
        assert_eq!(failure.status(), 500);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["meta"]["httpStatusCode"], 500);
        assert!(json["meta"]["timings"]["overall"].is_u64());
        assert!(json["meta"]["timings"]["enqueued"].is_u64());
        assert!(json["errors"][0]["message"].as_str().unwrap().contains("worker failed"));
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_record_path() {
        let (status, json) = get_json("/entity-paths?from=CUSTOMERS:1001&to=CUSTOMERS:1002").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["pathFound"], true);
        assert_eq!(json["data"]["entities"].as_array().unwrap().len(), 2);
        assert_eq!(json["data"]["entities"][0]["resolvedEntity"]["phoneData"][0], "HOME: 702-555-1212");
        assert_eq!(json["links"]["self"], "/entity-paths?from=CUSTOMERS:1001&to=CUSTOMERS:1002");
        assert_eq!(json["meta"]["httpStatusCode"], 200);
        assert_eq!(json["meta"]["httpMethod"], "GET");
        assert!(json["meta"]["nativeApiVersion"].is_string());
        assert!(json["meta"]["timings"]["overall"].is_u64());
        assert!(json["meta"]["timings"]["enqueued"].is_u64());
        assert!(json["meta"]["timings"]["nativeApi:findPathByRecordID"].is_u64());
        assert!(json.get("rawData").is_none());
    }

    #[tokio::test]
    async fn test_raw_passthrough() {
        let (status, json) = get_json("/entity-paths?from=1&to=3&withRaw=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rawData"]["ENTITY_PATHS"][0]["ENTITIES"], serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_unknown_source_is_bad_request() {
        let (status, json) = get_json("/entity-paths?from=1&to=2&s=UNKNOWN_SOURCE").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["meta"]["httpStatusCode"], 400);
        assert!(json["errors"][0]["message"].as_str().unwrap().contains("UNKNOWN_SOURCE"));
    }

    #[tokio::test]
    async fn test_mixed_avoid_list_is_bad_request() {
        let (status, _) = get_json("/entity-paths?from=1&to=3&x=2&x=CUSTOMERS:1002").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_from_reported_first() {
        let (status, json) = get_json("/entity-paths").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"][0]["message"].as_str().unwrap().contains("\"from\""));
    }

    #[tokio::test]
    async fn test_bad_integer_is_bad_request() {
        let (status, _) = get_json("/entity-networks?e=1&maxEntities=lots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_entity_is_server_error() {
        let (status, json) = get_json("/entity-paths?from=1&to=42").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["errors"][0]["code"], 37);
    }

    #[tokio::test]
    async fn test_network() {
        let (status, json) = get_json("/entity-networks?e=1&e=2&buildOut=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["entityPaths"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"]["entities"].as_array().unwrap().len(), 3);
        assert_eq!(json["data"]["maxEntityLimitReached"], false);
    }
}
