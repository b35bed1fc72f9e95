//! Shared test fixtures: a deterministic embedder, scripted extractors, and
//! a migrated temporary database.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::db::migrate::run_migrations;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{DataGraphError, Result};
use crate::extraction::{ExtractedGraph, GraphExtractor};

/// Deterministic bag-of-words embedder. Tokens hash into dimension buckets
/// and the count vector is L2-normalized, so overlapping texts land close
/// together and disjoint texts land far apart without any network call.
pub struct StubEmbedder {
    dimensions: usize,
    fail: bool,
}

impl StubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail: false,
        }
    }

    /// An embedder whose every call fails.
    pub fn failing(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail: true,
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimensions;
            vec[bucket] += 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(DataGraphError::Embedding(
                "stub embedder configured to fail".to_string(),
            ));
        }
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }
}

/// Extractor that returns a fixed graph regardless of input.
pub struct StubExtractor {
    graph: ExtractedGraph,
}

impl StubExtractor {
    pub fn new(graph: ExtractedGraph) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl GraphExtractor for StubExtractor {
    async fn extract_graph(&self, _document_text: &str) -> Result<ExtractedGraph> {
        Ok(self.graph.clone())
    }
}

/// Extractor whose every call fails.
pub struct FailingExtractor;

#[async_trait]
impl GraphExtractor for FailingExtractor {
    async fn extract_graph(&self, _document_text: &str) -> Result<ExtractedGraph> {
        Err(DataGraphError::Extraction(
            "stub extractor configured to fail".to_string(),
        ))
    }
}

pub fn crate_migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

/// Open a fresh database in a temp directory and apply the full schema.
/// The `TempDir` must be kept alive for the lifetime of the `Db`.
pub async fn setup_db() -> (Db, TempDir) {
    let tmp = TempDir::new().expect("create temp dir");
    let db = Db::new(tmp.path().join("test.db"));
    let mut conn = db.open_connection().expect("open connection");
    run_migrations(&mut conn, &crate_migrations_dir()).expect("run migrations");
    (db, tmp)
}
