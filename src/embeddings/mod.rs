//! Embedding provider abstraction and vector storage codec.
//!
//! Every persisted entity carries an embedding derived from its current
//! `(name, description)` pair. The input composition and the BLOB codec live
//! here so the entity store and similarity search agree on both.

pub mod openai;

pub use openai::OpenAIEmbedder;

use async_trait::async_trait;

use crate::error::Result;

/// Core embedder trait - all embedding providers implement this.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the dimension of the embeddings.
    fn dimension(&self) -> usize;
}

/// Compose the embedding input from an entity's name and description.
///
/// Deterministic: the same `(name, description)` pair always yields the same
/// input, so stored embeddings stay coherent with the fields they summarize.
pub fn embedding_input(name: &str, description: Option<&str>) -> String {
    match description {
        Some(desc) if !desc.is_empty() => format!("{}\n{}", name, desc),
        _ => name.to_string(),
    }
}

/// Serialize an embedding to a BLOB (little-endian f32 array)
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Parse an embedding BLOB back to Vec<f32>
///
/// Returns None when the byte length is not a multiple of 4.
pub fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    blob.chunks(4)
        .map(|bytes| {
            let arr: [u8; 4] = bytes.try_into().ok()?;
            Some(f32::from_le_bytes(arr))
        })
        .collect()
}
