//! Engine facade: owns the database handle, the embedding and extraction
//! providers, and the configured policy knobs. All operations are thin
//! delegations to the store layer; the one policy this layer adds is the
//! optional ontology enforcement hook on relationship creation.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::EmbeddingCache;
use crate::config::Config;
use crate::db::migrate::run_migrations;
use crate::db::Db;
use crate::embeddings::openai::OpenAIEmbedder;
use crate::embeddings::Embedder;
use crate::error::{DataGraphError, Result};
use crate::extraction::openai::OpenAIExtractor;
use crate::extraction::GraphExtractor;
use crate::ingest::{ingest_document, IngestReport};
use crate::store::entities::{
    create_entity, delete_entity, get_entity, list_entities, resolve_entity, update_entity,
};
use crate::store::ontology::{
    list_entity_type_properties, list_entity_types, list_relationship_ontology,
    relationship_allowed, EntityTypePropertyRow, EntityTypeRow, RelationshipOntologyRow,
};
use crate::store::relationships::{
    create_relationship, delete_relationship, delete_relationship_by_id, get_relationships,
    get_relationships_between, list_all_relationships, update_relationship,
    update_relationship_by_id,
};
use crate::store::similarity::find_similar;
use crate::store::types::{
    EntityKind, EntityPatch, EntityRecord, RelationshipPatch, RelationshipRecord, SimilarEntity,
};

/// The privacy data graph engine.
///
/// Clone-free handle: wrap in `Arc` to share across tasks. Every operation
/// is independently safe to call concurrently; serialization happens at the
/// SQLite layer.
pub struct DataGraph {
    db: Db,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn GraphExtractor>,
    config: Config,
}

impl DataGraph {
    /// Open the engine with OpenAI-backed providers built from config.
    ///
    /// Applies pending migrations before returning. Missing API key
    /// environment variables are a hard startup error.
    pub fn open(config: Config, migrations_dir: &Path) -> Result<Self> {
        let embed_key = std::env::var(&config.embeddings.api_key_env).map_err(|_| {
            DataGraphError::Config(format!(
                "Environment variable {} not set",
                config.embeddings.api_key_env
            ))
        })?;
        let extract_key = std::env::var(&config.extraction.api_key_env).map_err(|_| {
            DataGraphError::Config(format!(
                "Environment variable {} not set",
                config.extraction.api_key_env
            ))
        })?;

        let cache = Arc::new(EmbeddingCache::new(config.embeddings.cache_capacity));
        let embedder = Arc::new(OpenAIEmbedder::new(
            embed_key,
            config.embeddings.model.clone(),
            config.embeddings.dimensions,
            Some(cache),
        ));
        let extractor = Arc::new(OpenAIExtractor::new(
            extract_key,
            config.extraction.model.clone(),
        ));

        Self::with_providers(config, embedder, extractor, migrations_dir)
    }

    /// Open the engine with caller-supplied providers.
    pub fn with_providers(
        config: Config,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn GraphExtractor>,
        migrations_dir: &Path,
    ) -> Result<Self> {
        let db = Db::new(config.db_path());
        let mut conn = db.open_connection()?;
        run_migrations(&mut conn, migrations_dir)?;

        Ok(Self {
            db,
            embedder,
            extractor,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Entities ---

    pub async fn create_entity(
        &self,
        kind: EntityKind,
        name: &str,
        description: Option<&str>,
        properties: Option<Map<String, Value>>,
    ) -> Result<String> {
        create_entity(
            &self.db,
            self.embedder.as_ref(),
            kind,
            name,
            description,
            properties,
        )
        .await
    }

    pub async fn get_entity(&self, kind: EntityKind, entity_id: &str) -> Result<Option<EntityRecord>> {
        get_entity(&self.db, kind, entity_id).await
    }

    pub async fn update_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
        patch: EntityPatch,
    ) -> Result<bool> {
        update_entity(&self.db, self.embedder.as_ref(), kind, entity_id, patch).await
    }

    pub async fn delete_entity(&self, kind: EntityKind, entity_id: &str) -> Result<bool> {
        delete_entity(&self.db, kind, entity_id).await
    }

    pub async fn list_entities(&self, kind: EntityKind, limit: usize) -> Result<Vec<EntityRecord>> {
        list_entities(&self.db, kind, limit).await
    }

    /// Locate an entity id across all five collections.
    pub async fn resolve_entity(&self, entity_id: &str) -> Result<Option<(EntityKind, String)>> {
        resolve_entity(&self.db, entity_id).await
    }

    // --- Relationships ---

    /// Create a directed relationship and return its id.
    ///
    /// With ontology enforcement off (the default) the endpoints are not
    /// verified and dangling ids are accepted. With it on, both endpoints
    /// must exist and the `(source type, relationship type, target type)`
    /// triple must be declared in the catalog.
    pub async fn create_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: &str,
        properties: Option<Map<String, Value>>,
    ) -> Result<String> {
        if self.config.ontology.enforce {
            let (source_kind, _) = resolve_entity(&self.db, source_id)
                .await?
                .ok_or_else(|| DataGraphError::EntityNotFound(source_id.to_string()))?;
            let (target_kind, _) = resolve_entity(&self.db, target_id)
                .await?
                .ok_or_else(|| DataGraphError::EntityNotFound(target_id.to_string()))?;

            let allowed = relationship_allowed(
                &self.db,
                relationship_type,
                source_kind.type_name(),
                target_kind.type_name(),
            )
            .await?;
            if !allowed {
                return Err(DataGraphError::OntologyViolation(format!(
                    "Relationship '{}' from {} to {} is not declared in the ontology",
                    relationship_type, source_kind, target_kind
                )));
            }
        }

        create_relationship(&self.db, source_id, target_id, relationship_type, properties).await
    }

    pub async fn get_relationships(
        &self,
        entity_id: Option<&str>,
        relationship_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RelationshipRecord>> {
        get_relationships(&self.db, entity_id, relationship_type, limit).await
    }

    pub async fn get_relationships_between(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Vec<RelationshipRecord>> {
        get_relationships_between(&self.db, source_id, target_id).await
    }

    /// Update the oldest relationship between a pair of entities.
    pub async fn update_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        patch: RelationshipPatch,
    ) -> Result<bool> {
        update_relationship(&self.db, source_id, target_id, patch).await
    }

    pub async fn update_relationship_by_id(
        &self,
        relationship_id: &str,
        patch: RelationshipPatch,
    ) -> Result<bool> {
        update_relationship_by_id(&self.db, relationship_id, patch).await
    }

    /// Delete the oldest relationship between a pair of entities.
    pub async fn delete_relationship(&self, source_id: &str, target_id: &str) -> Result<bool> {
        delete_relationship(&self.db, source_id, target_id).await
    }

    pub async fn delete_relationship_by_id(&self, relationship_id: &str) -> Result<bool> {
        delete_relationship_by_id(&self.db, relationship_id).await
    }

    pub async fn list_all_relationships(
        &self,
        limit: usize,
        with_entity_details: bool,
    ) -> Result<Vec<RelationshipRecord>> {
        list_all_relationships(&self.db, limit, with_entity_details).await
    }

    // --- Similarity ---

    /// Search one collection for entities near the supplied name/description.
    /// A `limit` of `None` uses the configured default.
    pub async fn find_similar(
        &self,
        kind: EntityKind,
        name: &str,
        description: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarEntity>> {
        let limit = limit.unwrap_or(self.config.similarity.default_limit);
        find_similar(&self.db, self.embedder.as_ref(), kind, name, description, limit).await
    }

    // --- Ontology catalog ---

    pub async fn list_entity_types(&self) -> Result<Vec<EntityTypeRow>> {
        list_entity_types(&self.db).await
    }

    pub async fn list_entity_type_properties(
        &self,
        entity_type: &str,
    ) -> Result<Vec<EntityTypePropertyRow>> {
        list_entity_type_properties(&self.db, entity_type).await
    }

    pub async fn list_relationship_ontology(&self) -> Result<Vec<RelationshipOntologyRow>> {
        list_relationship_ontology(&self.db).await
    }

    // --- Ingestion ---

    /// Extract a graph from document text and persist it.
    pub async fn ingest_document(&self, document_text: &str) -> Result<IngestReport> {
        ingest_document(
            &self.db,
            self.embedder.as_ref(),
            self.extractor.as_ref(),
            document_text,
            self.config.ontology.enforce,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DataGraphConfig, EmbeddingsConfig, ExtractionConfig, OntologyConfig, SimilarityConfig,
    };
    use crate::extraction::{ExtractedEdge, ExtractedGraph, ExtractedNode};
    use crate::testutil::{crate_migrations_dir, StubEmbedder, StubExtractor};
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir, enforce: bool) -> Config {
        Config {
            datagraph: DataGraphConfig {
                db_path: tmp.path().join("graph.db"),
                log_level: "debug".to_string(),
            },
            embeddings: EmbeddingsConfig {
                provider: "stub".to_string(),
                model: "stub".to_string(),
                api_key_env: "UNUSED".to_string(),
                dimensions: 64,
                cache_capacity: 16,
            },
            extraction: ExtractionConfig {
                model: "stub".to_string(),
                api_key_env: "UNUSED".to_string(),
            },
            similarity: SimilarityConfig::default(),
            ontology: OntologyConfig { enforce },
        }
    }

    fn open_engine(tmp: &TempDir, enforce: bool, graph: ExtractedGraph) -> DataGraph {
        DataGraph::with_providers(
            test_config(tmp, enforce),
            Arc::new(StubEmbedder::new(64)),
            Arc::new(StubExtractor::new(graph)),
            &crate_migrations_dir(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_entity_lifecycle_through_facade() {
        let tmp = TempDir::new().unwrap();
        let engine = open_engine(&tmp, false, ExtractedGraph::default());

        let id = engine
            .create_entity(EntityKind::Asset, "Acme CRM", Some("Customer platform"), None)
            .await
            .unwrap();

        let record = engine.get_entity(EntityKind::Asset, &id).await.unwrap().unwrap();
        assert_eq!(record.name, "Acme CRM");

        let updated = engine
            .update_entity(
                EntityKind::Asset,
                &id,
                EntityPatch {
                    name: None,
                    description: Some("CRM platform".to_string()),
                    properties: None,
                },
            )
            .await
            .unwrap();
        assert!(updated);

        assert!(engine.delete_entity(EntityKind::Asset, &id).await.unwrap());
        assert!(engine.get_entity(EntityKind::Asset, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enforcement_off_accepts_anything() {
        let tmp = TempDir::new().unwrap();
        let engine = open_engine(&tmp, false, ExtractedGraph::default());

        // Dangling ids and an undeclared type both pass without enforcement
        let id = engine
            .create_relationship("no-such-a", "no-such-b", "MADE_UP", None)
            .await
            .unwrap();
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn test_enforcement_rejects_undeclared_triple() {
        let tmp = TempDir::new().unwrap();
        let engine = open_engine(&tmp, true, ExtractedGraph::default());

        let asset = engine
            .create_entity(EntityKind::Asset, "Acme CRM", None, None)
            .await
            .unwrap();
        let vendor = engine
            .create_entity(EntityKind::Vendor, "MailWorks", None, None)
            .await
            .unwrap();

        // Declared direction passes
        engine
            .create_relationship(&asset, &vendor, "TRANSFERS_TO", None)
            .await
            .unwrap();

        // Reversed direction is not in the catalog
        let err = engine
            .create_relationship(&vendor, &asset, "TRANSFERS_TO", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DataGraphError::OntologyViolation(_)));

        // Dangling endpoint cannot be type-checked
        let err = engine
            .create_relationship("no-such", &vendor, "TRANSFERS_TO", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DataGraphError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn test_find_similar_uses_default_limit() {
        let tmp = TempDir::new().unwrap();
        let engine = open_engine(&tmp, false, ExtractedGraph::default());

        for i in 0..8 {
            engine
                .create_entity(EntityKind::Vendor, &format!("Vendor {}", i), None, None)
                .await
                .unwrap();
        }

        let hits = engine
            .find_similar(EntityKind::Vendor, "Vendor 1", None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), engine.config().similarity.default_limit);

        let two = engine
            .find_similar(EntityKind::Vendor, "Vendor 1", None, Some(2))
            .await
            .unwrap();
        assert_eq!(two.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_through_facade_honors_enforcement() {
        let tmp = TempDir::new().unwrap();
        let graph = ExtractedGraph {
            nodes: vec![
                ExtractedNode {
                    id: "Acme CRM".to_string(),
                    entity_type: "Asset".to_string(),
                    description: None,
                    properties: None,
                },
                ExtractedNode {
                    id: "MailWorks".to_string(),
                    entity_type: "Vendor".to_string(),
                    description: None,
                    properties: None,
                },
            ],
            relationships: vec![ExtractedEdge {
                source: "MailWorks".to_string(),
                target: "Acme CRM".to_string(),
                relationship_type: "TRANSFERS_TO".to_string(),
                properties: None,
            }],
        };
        let engine = open_engine(&tmp, true, graph);

        let report = engine.ingest_document("vendor transfer doc").await.unwrap();
        assert_eq!(report.nodes_found, 2);
        // The reversed edge is skipped, not fatal
        assert_eq!(report.relationships_found, 0);
        assert!(report.edge_outcomes[0].skipped.is_some());
    }
}
