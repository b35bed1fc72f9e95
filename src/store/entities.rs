//! Entity store: uniform create/get/update/delete/list over the five
//! collections, with embedding maintenance.
//!
//! Every mutation is one rusqlite transaction. A create either lands a
//! complete row (including embedding) or nothing; an update that touches
//! name or description recomputes the embedding from the merged current
//! pair before the column write commits.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::db::Db;
use crate::embeddings::{embedding_input, embedding_to_blob, Embedder};
use crate::error::{DataGraphError, Result};
use crate::store::types::{
    now_rfc3339, props_from_json, props_to_json, EntityKind, EntityPatch, EntityRecord,
};

/// Create a new entity and return its generated identifier.
///
/// The embedding is computed from `(name, description)` before the insert;
/// an embedding failure means no row is written.
pub async fn create_entity(
    db: &Db,
    embedder: &dyn Embedder,
    kind: EntityKind,
    name: &str,
    description: Option<&str>,
    properties: Option<Map<String, Value>>,
) -> Result<String> {
    if name.trim().is_empty() {
        return Err(DataGraphError::InvalidInput(
            "Entity name must not be empty".to_string(),
        ));
    }

    let embedding = embedder.embed(&embedding_input(name, description)).await?;

    let entity_id = uuid::Uuid::new_v4().to_string();
    let entity_id_clone = entity_id.clone();
    let name = name.to_string();
    let description = description.map(|s| s.to_string());
    let properties_json = props_to_json(properties.as_ref());
    let blob = embedding_to_blob(&embedding);

    db.with_connection(move |conn| {
        let now = now_rfc3339();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO {} (entity_id, name, description, properties, embedding, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                kind.table()
            ),
            params![entity_id_clone, name, description, properties_json, blob, now, now],
        )?;
        tx.commit()?;
        Ok(())
    })
    .await?;

    log::debug!("Created {} entity {}", kind, entity_id);
    Ok(entity_id)
}

/// Retrieve an entity by identifier.
pub async fn get_entity(db: &Db, kind: EntityKind, entity_id: &str) -> Result<Option<EntityRecord>> {
    let entity_id = entity_id.to_string();
    db.with_connection(move |conn| {
        let record = conn
            .query_row(
                &format!(
                    "SELECT entity_id, name, description, properties, created_at, updated_at
                     FROM {} WHERE entity_id = ?1",
                    kind.table()
                ),
                params![entity_id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    })
    .await
}

/// Update an entity. Returns `false` when the identifier does not exist.
///
/// When name or description changes, the current value of the other field is
/// read first and the embedding recomputed from the merged pair, so a stale
/// caller value can never be paired with a fresh one in the embedding input.
/// An empty patch is a successful no-op.
pub async fn update_entity(
    db: &Db,
    embedder: &dyn Embedder,
    kind: EntityKind,
    entity_id: &str,
    patch: EntityPatch,
) -> Result<bool> {
    if patch.is_empty() {
        return Ok(true);
    }

    let current = match get_entity(db, kind, entity_id).await? {
        Some(record) => record,
        None => return Ok(false),
    };

    let merged_name = patch.name.clone().unwrap_or_else(|| current.name.clone());
    let merged_description = patch
        .description
        .clone()
        .or_else(|| current.description.clone());

    let new_embedding = if patch.touches_embedding() {
        let input = embedding_input(&merged_name, merged_description.as_deref());
        Some(embedder.embed(&input).await?)
    } else {
        None
    };

    let entity_id = entity_id.to_string();
    let properties_json = props_to_json(patch.properties.as_ref());
    let set_properties = patch.properties.is_some();
    let touches_embedding = patch.touches_embedding();

    let updated = db
        .with_connection(move |conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;

            let mut sets = vec!["updated_at = ?1".to_string()];
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

            if touches_embedding {
                sets.push(format!("name = ?{}", values.len() + 1));
                values.push(Box::new(merged_name));
                sets.push(format!("description = ?{}", values.len() + 1));
                values.push(Box::new(merged_description));
                sets.push(format!("embedding = ?{}", values.len() + 1));
                values.push(Box::new(embedding_to_blob(
                    new_embedding.as_deref().unwrap_or_default(),
                )));
            }

            if set_properties {
                sets.push(format!("properties = ?{}", values.len() + 1));
                values.push(Box::new(properties_json));
            }

            let sql = format!(
                "UPDATE {} SET {} WHERE entity_id = ?{}",
                kind.table(),
                sets.join(", "),
                values.len() + 1
            );
            values.push(Box::new(entity_id));

            let rows = tx.execute(&sql, rusqlite::params_from_iter(values))?;
            tx.commit()?;
            Ok(rows > 0)
        })
        .await?;

    Ok(updated)
}

/// Delete an entity and all relationships referencing it (either side), as
/// one atomic unit. Returns `false` when the identifier does not exist.
pub async fn delete_entity(db: &Db, kind: EntityKind, entity_id: &str) -> Result<bool> {
    let entity_id = entity_id.to_string();
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM entity_relationships WHERE source_id = ?1 OR target_id = ?1",
            params![entity_id],
        )?;
        let rows = tx.execute(
            &format!("DELETE FROM {} WHERE entity_id = ?1", kind.table()),
            params![entity_id],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    })
    .await
}

/// List entities ordered by name, bounded by `limit`.
pub async fn list_entities(db: &Db, kind: EntityKind, limit: usize) -> Result<Vec<EntityRecord>> {
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT entity_id, name, description, properties, created_at, updated_at
             FROM {} ORDER BY name LIMIT ?1",
            kind.table()
        ))?;
        let records: Vec<EntityRecord> = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(DataGraphError::Database)?;
        Ok(records)
    })
    .await
}

/// Find which collection an identifier belongs to, returning its kind and name.
///
/// Synchronous over a connection so callers can resolve endpoints inside the
/// same snapshot as an edge read.
pub(crate) fn lookup_entity(
    conn: &Connection,
    entity_id: &str,
) -> Result<Option<(EntityKind, String)>> {
    for kind in EntityKind::ALL {
        let name: Option<String> = conn
            .query_row(
                &format!("SELECT name FROM {} WHERE entity_id = ?1", kind.table()),
                params![entity_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(name) = name {
            return Ok(Some((kind, name)));
        }
    }
    Ok(None)
}

/// Async wrapper over [`lookup_entity`] for single resolutions.
pub async fn resolve_entity(db: &Db, entity_id: &str) -> Result<Option<(EntityKind, String)>> {
    let entity_id = entity_id.to_string();
    db.with_connection(move |conn| lookup_entity(conn, &entity_id))
        .await
}

fn row_to_record(row: &rusqlite::Row<'_>) -> std::result::Result<EntityRecord, rusqlite::Error> {
    Ok(EntityRecord {
        entity_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        properties: props_from_json(row.get(3)?),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
