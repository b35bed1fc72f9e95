//! Per-collection nearest-neighbor search over stored embeddings.
//!
//! The query embedding is computed once from the supplied
//! `(name, description)`, then every stored embedding in the chosen
//! collection is ranked by ascending cosine distance. One collection per
//! call; cross-type search is a caller concern.

use rusqlite::params;

use crate::db::Db;
use crate::embeddings::{embedding_input, parse_embedding, Embedder};
use crate::error::{DataGraphError, Result};
use crate::store::types::{EntityKind, SimilarEntity};

/// Find entities similar to the supplied name/description.
///
/// Returns at most `limit` hits sorted by non-decreasing cosine distance
/// (`[0, 2]`, 0 = identical direction). An empty collection yields an empty
/// sequence. The distance is reported as-is: match thresholds are caller
/// policy.
pub async fn find_similar(
    db: &Db,
    embedder: &dyn Embedder,
    kind: EntityKind,
    name: &str,
    description: Option<&str>,
    limit: usize,
) -> Result<Vec<SimilarEntity>> {
    let query_vec = embedder.embed(&embedding_input(name, description)).await?;

    if query_vec.len() != embedder.dimension() {
        return Err(DataGraphError::Embedding(format!(
            "Unexpected embedding dimension: expected {}, got {}",
            embedder.dimension(),
            query_vec.len()
        )));
    }

    let rows = db
        .with_connection(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT entity_id, name, description, embedding FROM {}",
                kind.table()
            ))?;
            let mut rows = stmt.query(params![])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ));
            }
            Ok::<Vec<_>, DataGraphError>(results)
        })
        .await?;

    let expected_dim = query_vec.len();
    let mut scored: Vec<SimilarEntity> = Vec::new();
    for (entity_id, name, description, blob) in rows {
        let embedding = match parse_embedding(&blob) {
            Some(e) => e,
            None => {
                log::warn!("Skipping {} entity {} with corrupt embedding", kind, entity_id);
                continue;
            }
        };
        if embedding.len() != expected_dim {
            log::warn!(
                "Skipping {} entity {} with mismatched embedding dimension",
                kind,
                entity_id
            );
            continue;
        }
        scored.push(SimilarEntity {
            entity_id,
            name,
            description,
            distance: cosine_distance(&query_vec, &embedding),
        });
    }

    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);

    Ok(scored)
}

/// Compute cosine distance (1 - cosine similarity) between two vectors.
///
/// Range [0, 2]: 0 for identical direction, 1 for orthogonal, 2 for
/// opposite. A zero-magnitude vector yields the neutral distance 1.0.
///
/// # Panics
///
/// Panics if vectors have different lengths (callers check dimensions first)
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "Vectors must have same length for cosine distance"
    );

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entities::create_entity;
    use crate::testutil::{setup_db, StubEmbedder};

    #[test]
    fn test_cosine_distance_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let d = cosine_distance(&a, &a);
        assert!(d.abs() < 1e-6, "Identical vectors should have distance 0.0");
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let d = cosine_distance(&a, &b);
        assert!((d - 1.0).abs() < 1e-6, "Orthogonal vectors should have distance 1.0");
    }

    #[test]
    fn test_cosine_distance_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        let d = cosine_distance(&a, &b);
        assert!((d - 2.0).abs() < 1e-6, "Opposite vectors should have distance 2.0");
    }

    #[test]
    fn test_cosine_distance_zero_magnitude() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_distance(&a, &b), 1.0);
    }

    #[test]
    fn test_cosine_distance_magnitude_independent() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![2.0, 0.0, 0.0];
        assert!(cosine_distance(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_collection_returns_empty() {
        let (db, _tmp) = setup_db().await;
        let embedder = StubEmbedder::new(64);

        let hits = find_similar(&db, &embedder, EntityKind::Asset, "Anything", None, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_results_bounded_and_sorted() {
        let (db, _tmp) = setup_db().await;
        let embedder = StubEmbedder::new(64);

        for name in [
            "AWS RDS",
            "AWS S3 Bucket",
            "Marketing Mailer",
            "Payroll System",
            "Customer Portal",
        ] {
            create_entity(&db, &embedder, EntityKind::Asset, name, None, None)
                .await
                .unwrap();
        }

        let hits = find_similar(&db, &embedder, EntityKind::Asset, "AWS RDS Database", None, 3)
            .await
            .unwrap();
        assert!(hits.len() <= 3);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[tokio::test]
    async fn test_near_duplicate_below_threshold() {
        let (db, _tmp) = setup_db().await;
        let embedder = StubEmbedder::new(64);

        let id = create_entity(&db, &embedder, EntityKind::Asset, "AWS RDS", None, None)
            .await
            .unwrap();
        create_entity(&db, &embedder, EntityKind::Asset, "Payroll System", None, None)
            .await
            .unwrap();

        let hits = find_similar(&db, &embedder, EntityKind::Asset, "AWS RDS Database", Some(""), 5)
            .await
            .unwrap();

        let top = &hits[0];
        assert_eq!(top.entity_id, id);
        assert!(
            top.distance < 0.3,
            "near-duplicate should score below the 0.3 threshold, got {}",
            top.distance
        );
    }

    #[tokio::test]
    async fn test_only_one_collection_searched() {
        let (db, _tmp) = setup_db().await;
        let embedder = StubEmbedder::new(64);

        create_entity(&db, &embedder, EntityKind::Vendor, "AWS RDS", None, None)
            .await
            .unwrap();

        // The identical name lives in Vendors, not Assets
        let hits = find_similar(&db, &embedder, EntityKind::Asset, "AWS RDS", None, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
