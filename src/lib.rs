//! Privacy data graph engine.
//!
//! Stores typed privacy entities (assets, processing activities, data
//! elements, data subject types, vendors) in per-type SQLite collections,
//! links them with directed relationships, ranks them by embedding
//! similarity, and materializes graphs extracted from free-text documents
//! by a language model.

pub mod cache;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod ingest;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::{DataGraphError, Result};
pub use ingest::{EdgeOutcome, IngestReport, NodeOutcome};
pub use service::DataGraph;
pub use store::{
    EndpointDetail, EntityKind, EntityPatch, EntityRecord, RelationshipPatch, RelationshipRecord,
    SimilarEntity,
};
