//! Persistence layer: typed entity collections, directed relationships,
//! similarity ranking, and the read-only ontology catalog.

pub mod entities;
pub mod ontology;
pub mod relationships;
pub mod similarity;
pub mod types;

pub use types::{
    EndpointDetail, EntityKind, EntityPatch, EntityRecord, RelationshipPatch, RelationshipRecord,
    SimilarEntity,
};
