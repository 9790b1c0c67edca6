//! Pathnet HTTP - REST surface for entity path and network queries
//!
//! Serves `GET /entity-paths`, `GET /entity-networks` and `GET /health`
//! over any [`pathnet_core::ResolutionEngine`].

pub mod query;
pub mod server;

pub use query::QueryParams;
pub use server::{create_router, run_server, AppState, Reply, DEFAULT_CONCURRENCY};
