//! Graph ingestion pipeline: document text in, persisted graph out.
//!
//! Linear, best-effort, no retry loop. Extraction failure aborts the whole
//! run; individual node/edge failures are logged, skipped, and reported in
//! the per-item outcome lists. There is no rollback across items: re-running
//! the same document creates duplicates unless the caller deduplicates via
//! similarity search first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{DataGraphError, Result};
use crate::extraction::GraphExtractor;
use crate::store::entities::create_entity;
use crate::store::ontology::relationship_allowed;
use crate::store::relationships::create_relationship;
use crate::store::types::EntityKind;

/// Per-node materialization outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub name: String,
    pub entity_type: String,
    /// Assigned identifier when the node was persisted
    pub entity_id: Option<String>,
    /// Reason the node was skipped, when it was
    pub skipped: Option<String>,
}

/// Per-edge materialization outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeOutcome {
    pub source: String,
    pub target: String,
    pub relationship_type: String,
    pub relationship_id: Option<String>,
    pub skipped: Option<String>,
}

/// What a document ingestion actually persisted.
///
/// The aggregate counts are persisted counts, not extracted counts: a lower
/// bound on document fidelity. The outcome lists let callers reconcile or
/// retry just the failed subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub nodes_found: usize,
    pub relationships_found: usize,
    pub node_outcomes: Vec<NodeOutcome>,
    pub edge_outcomes: Vec<EdgeOutcome>,
}

/// Extract a graph from document text and materialize it.
///
/// Phase 1 extracts a node/edge list; a malformed response or an empty node
/// list aborts with an extraction error and nothing is written. Phase 2
/// creates entities one atomic unit at a time, building a name-to-id map as
/// creations succeed. Phase 3 resolves edge endpoints through the map and
/// persists the edges that resolve. When `enforce_ontology` is set, edges
/// whose `(source type, relationship type, target type)` triple is not
/// declared in the catalog are skipped like any other per-item failure.
pub async fn ingest_document(
    db: &Db,
    embedder: &dyn Embedder,
    extractor: &dyn GraphExtractor,
    document_text: &str,
    enforce_ontology: bool,
) -> Result<IngestReport> {
    let graph = extractor.extract_graph(document_text).await?;

    if graph.nodes.is_empty() {
        return Err(DataGraphError::Extraction(
            "Failed to extract a valid graph from the document".to_string(),
        ));
    }

    let mut name_to_id: HashMap<String, (String, EntityKind)> = HashMap::new();
    let mut node_outcomes = Vec::with_capacity(graph.nodes.len());
    let mut nodes_found = 0;

    for node in &graph.nodes {
        let kind = match EntityKind::from_type_name(&node.entity_type) {
            Some(kind) => kind,
            None => {
                log::warn!(
                    "Unknown entity type '{}' for node '{}', skipping",
                    node.entity_type,
                    node.id
                );
                node_outcomes.push(NodeOutcome {
                    name: node.id.clone(),
                    entity_type: node.entity_type.clone(),
                    entity_id: None,
                    skipped: Some(format!("Unknown entity type '{}'", node.entity_type)),
                });
                continue;
            }
        };

        match create_entity(
            db,
            embedder,
            kind,
            &node.id,
            node.description.as_deref(),
            node.properties.clone(),
        )
        .await
        {
            Ok(entity_id) => {
                name_to_id.insert(node.id.clone(), (entity_id.clone(), kind));
                nodes_found += 1;
                node_outcomes.push(NodeOutcome {
                    name: node.id.clone(),
                    entity_type: node.entity_type.clone(),
                    entity_id: Some(entity_id),
                    skipped: None,
                });
            }
            Err(e) => {
                log::warn!("Failed to create {} '{}': {}", kind, node.id, e);
                node_outcomes.push(NodeOutcome {
                    name: node.id.clone(),
                    entity_type: node.entity_type.clone(),
                    entity_id: None,
                    skipped: Some(e.to_string()),
                });
            }
        }
    }

    let mut edge_outcomes = Vec::with_capacity(graph.relationships.len());
    let mut relationships_found = 0;

    for edge in &graph.relationships {
        let endpoints = match (name_to_id.get(&edge.source), name_to_id.get(&edge.target)) {
            (Some(source), Some(target)) => (source.clone(), target.clone()),
            _ => {
                log::warn!(
                    "Skipping relationship '{}' between '{}' and '{}': one or both entities not materialized",
                    edge.relationship_type,
                    edge.source,
                    edge.target
                );
                edge_outcomes.push(EdgeOutcome {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    relationship_type: edge.relationship_type.clone(),
                    relationship_id: None,
                    skipped: Some("One or both endpoints were not materialized".to_string()),
                });
                continue;
            }
        };
        let ((source_id, source_kind), (target_id, target_kind)) = endpoints;

        if enforce_ontology {
            let allowed = relationship_allowed(
                db,
                &edge.relationship_type,
                source_kind.type_name(),
                target_kind.type_name(),
            )
            .await?;
            if !allowed {
                log::warn!(
                    "Skipping relationship '{}' from {} to {}: not declared in ontology",
                    edge.relationship_type,
                    source_kind,
                    target_kind
                );
                edge_outcomes.push(EdgeOutcome {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    relationship_type: edge.relationship_type.clone(),
                    relationship_id: None,
                    skipped: Some(format!(
                        "Relationship '{}' from {} to {} is not declared in the ontology",
                        edge.relationship_type, source_kind, target_kind
                    )),
                });
                continue;
            }
        }

        match create_relationship(
            db,
            &source_id,
            &target_id,
            &edge.relationship_type,
            edge.properties.clone(),
        )
        .await
        {
            Ok(relationship_id) => {
                relationships_found += 1;
                edge_outcomes.push(EdgeOutcome {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    relationship_type: edge.relationship_type.clone(),
                    relationship_id: Some(relationship_id),
                    skipped: None,
                });
            }
            Err(e) => {
                log::warn!(
                    "Failed to create relationship '{}' between '{}' and '{}': {}",
                    edge.relationship_type,
                    edge.source,
                    edge.target,
                    e
                );
                edge_outcomes.push(EdgeOutcome {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    relationship_type: edge.relationship_type.clone(),
                    relationship_id: None,
                    skipped: Some(e.to_string()),
                });
            }
        }
    }

    log::info!(
        "Ingested document: {} entities, {} relationships persisted",
        nodes_found,
        relationships_found
    );

    Ok(IngestReport {
        nodes_found,
        relationships_found,
        node_outcomes,
        edge_outcomes,
    })
}
