//! Pathnet Engine - in-memory entity resolution engine
//!
//! Answers the eight path and network calls of
//! [`pathnet_core::ResolutionEngine`] from a JSON graph fixture.

pub mod error;
pub mod fixture;
pub mod memory;

pub use error::{EngineError, EngineResult};
pub use fixture::{Fixture, FixtureEntity, FixtureFeature, FixtureRelationship};
pub use memory::MemoryEngine;
