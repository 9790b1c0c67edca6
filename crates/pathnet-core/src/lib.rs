//! Pathnet Core - entity path and network queries over a resolution engine
//!
//! This crate provides identifier parsing, request validation, engine call
//! dispatch, result parsing and the response envelope for the Pathnet
//! HTTP layer.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod limits;
pub mod meta;
pub mod request;
pub mod response;
pub mod result;
pub mod server;
pub mod service;
pub mod timers;

pub use dispatch::{FilterMode, NetworkCall, PathCall};
pub use engine::{ResolutionEngine, FIND_PATH_PREFER_EXCLUDE};
pub use error::{Error, Result};
pub use identifier::{EntityIdentifier, IdentifierKind, RecordRef};
pub use meta::{HttpMethod, ResponseMeta};
pub use request::{NetworkParams, NetworkRequest, PathParams, PathRequest};
pub use response::{ApiResponse, ErrorDetail, ErrorResponse, Links, NetworkResponse, PathResponse};
pub use result::{EntityData, EntityPath, NetworkResult, PathLink, PathResult, RelatedEntity, ResolvedEntity};
pub use server::{NativeApiInfo, ServerInfo, REST_API_VERSION, SERVER_VERSION};
pub use service::EntityGraphService;
pub use timers::{TimerError, TimerState, Timers, Timings};
