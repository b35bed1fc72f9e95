//! Relationship store: directed edges between entity identifiers.
//!
//! Pure inserts: endpoints are not checked against the entity collections
//! and the type is not checked against the ontology (the optional
//! enforcement hook lives in the service layer). Pair-keyed update/delete
//! mutate exactly one edge - the oldest match - which is ambiguous when
//! several types exist between the same ordered pair; id-keyed variants
//! address a single edge without ambiguity.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::db::Db;
use crate::error::{DataGraphError, Result};
use crate::store::entities::lookup_entity;
use crate::store::types::{
    now_rfc3339, props_from_json, props_to_json, EndpointDetail, RelationshipPatch,
    RelationshipRecord,
};

const SELECT_COLUMNS: &str =
    "relationship_id, source_id, target_id, relationship_type, properties, created_at, updated_at";

/// Create a new relationship and return its generated identifier.
pub async fn create_relationship(
    db: &Db,
    source_id: &str,
    target_id: &str,
    relationship_type: &str,
    properties: Option<Map<String, Value>>,
) -> Result<String> {
    if relationship_type.trim().is_empty() {
        return Err(DataGraphError::InvalidInput(
            "Relationship type must not be empty".to_string(),
        ));
    }

    let relationship_id = uuid::Uuid::new_v4().to_string();
    let relationship_id_clone = relationship_id.clone();
    let source_id = source_id.to_string();
    let target_id = target_id.to_string();
    let relationship_type = relationship_type.to_string();
    let properties_json = props_to_json(properties.as_ref());

    db.with_connection(move |conn| {
        let now = now_rfc3339();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO entity_relationships
                 (relationship_id, source_id, target_id, relationship_type, properties, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                relationship_id_clone,
                source_id,
                target_id,
                relationship_type,
                properties_json,
                now,
                now
            ],
        )?;
        tx.commit()?;
        Ok(())
    })
    .await?;

    Ok(relationship_id)
}

/// Get relationships, optionally filtered by an endpoint (matching either
/// side) and/or by type. Both filters are combinable; results are bounded.
pub async fn get_relationships(
    db: &Db,
    entity_id: Option<&str>,
    relationship_type: Option<&str>,
    limit: usize,
) -> Result<Vec<RelationshipRecord>> {
    let entity_id = entity_id.map(|s| s.to_string());
    let relationship_type = relationship_type.map(|s| s.to_string());

    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT {} FROM entity_relationships
             WHERE (?1 IS NULL OR source_id = ?1 OR target_id = ?1)
               AND (?2 IS NULL OR relationship_type = ?2)
             ORDER BY created_at
             LIMIT ?3",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records: Vec<RelationshipRecord> = stmt
            .query_map(
                params![entity_id, relationship_type, limit as i64],
                row_to_record,
            )?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(DataGraphError::Database)?;
        Ok(records)
    })
    .await
}

/// All edges between one ordered pair, oldest first.
pub async fn get_relationships_between(
    db: &Db,
    source_id: &str,
    target_id: &str,
) -> Result<Vec<RelationshipRecord>> {
    let source_id = source_id.to_string();
    let target_id = target_id.to_string();

    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT {} FROM entity_relationships
             WHERE source_id = ?1 AND target_id = ?2
             ORDER BY created_at",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records: Vec<RelationshipRecord> = stmt
            .query_map(params![source_id, target_id], row_to_record)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(DataGraphError::Database)?;
        Ok(records)
    })
    .await
}

/// Update the first (oldest) relationship for an ordered pair.
///
/// Ambiguous when several types exist between the pair; prefer
/// [`update_relationship_by_id`] in that case. Returns `false` when no edge
/// exists for the pair.
pub async fn update_relationship(
    db: &Db,
    source_id: &str,
    target_id: &str,
    patch: RelationshipPatch,
) -> Result<bool> {
    let source_id = source_id.to_string();
    let target_id = target_id.to_string();

    if patch.is_empty() {
        return Ok(true);
    }

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        let target: Option<String> = tx
            .query_row(
                "SELECT relationship_id FROM entity_relationships
                 WHERE source_id = ?1 AND target_id = ?2
                 ORDER BY created_at LIMIT 1",
                params![source_id, target_id],
                |row| row.get(0),
            )
            .optional()?;

        let relationship_id = match target {
            Some(id) => id,
            None => return Ok(false),
        };

        apply_patch(&tx, &relationship_id, &patch)?;
        tx.commit()?;
        Ok(true)
    })
    .await
}

/// Update a relationship addressed by its own identifier.
pub async fn update_relationship_by_id(
    db: &Db,
    relationship_id: &str,
    patch: RelationshipPatch,
) -> Result<bool> {
    let relationship_id = relationship_id.to_string();

    if patch.is_empty() {
        return Ok(true);
    }

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM entity_relationships WHERE relationship_id = ?1",
                params![relationship_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(false);
        }

        apply_patch(&tx, &relationship_id, &patch)?;
        tx.commit()?;
        Ok(true)
    })
    .await
}

/// Delete the first (oldest) relationship for an ordered pair.
///
/// When several edges exist between the pair exactly one is removed, which
/// one is unspecified; prefer [`delete_relationship_by_id`]. Returns `false`
/// when no edge exists for the pair.
pub async fn delete_relationship(db: &Db, source_id: &str, target_id: &str) -> Result<bool> {
    let source_id = source_id.to_string();
    let target_id = target_id.to_string();

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "DELETE FROM entity_relationships WHERE relationship_id IN (
                 SELECT relationship_id FROM entity_relationships
                 WHERE source_id = ?1 AND target_id = ?2
                 ORDER BY created_at LIMIT 1
             )",
            params![source_id, target_id],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    })
    .await
}

/// Delete a relationship addressed by its own identifier.
pub async fn delete_relationship_by_id(db: &Db, relationship_id: &str) -> Result<bool> {
    let relationship_id = relationship_id.to_string();

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "DELETE FROM entity_relationships WHERE relationship_id = ?1",
            params![relationship_id],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    })
    .await
}

/// List all relationships, optionally joining endpoint name/type details.
///
/// Both the edge read and the endpoint resolution run inside one
/// transaction, so the details reflect the same snapshot as the edge list.
/// Dangling endpoints resolve to "Unknown".
pub async fn list_all_relationships(
    db: &Db,
    limit: usize,
    with_entity_details: bool,
) -> Result<Vec<RelationshipRecord>> {
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;

        let mut records = {
            let sql = format!(
                "SELECT {} FROM entity_relationships ORDER BY created_at LIMIT ?1",
                SELECT_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let records: Vec<RelationshipRecord> = stmt
                .query_map(params![limit as i64], row_to_record)?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
                .map_err(DataGraphError::Database)?;
            records
        };

        if with_entity_details {
            for record in &mut records {
                record.source_detail = Some(resolve_detail(&tx, &record.source_id)?);
                record.target_detail = Some(resolve_detail(&tx, &record.target_id)?);
            }
        }

        tx.commit()?;
        Ok(records)
    })
    .await
}

fn resolve_detail(conn: &Connection, entity_id: &str) -> Result<EndpointDetail> {
    Ok(match lookup_entity(conn, entity_id)? {
        Some((kind, name)) => EndpointDetail {
            name,
            entity_type: kind.type_name().to_string(),
        },
        None => EndpointDetail {
            name: "Unknown".to_string(),
            entity_type: "Unknown".to_string(),
        },
    })
}

fn apply_patch(conn: &Connection, relationship_id: &str, patch: &RelationshipPatch) -> Result<()> {
    let now = now_rfc3339();
    let mut sets = vec!["updated_at = ?1".to_string()];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

    if let Some(rel_type) = &patch.relationship_type {
        sets.push(format!("relationship_type = ?{}", values.len() + 1));
        values.push(Box::new(rel_type.clone()));
    }

    if let Some(props) = &patch.properties {
        sets.push(format!("properties = ?{}", values.len() + 1));
        values.push(Box::new(props_to_json(Some(props))));
    }

    let sql = format!(
        "UPDATE entity_relationships SET {} WHERE relationship_id = ?{}",
        sets.join(", "),
        values.len() + 1
    );
    values.push(Box::new(relationship_id.to_string()));

    conn.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(())
}

fn row_to_record(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<RelationshipRecord, rusqlite::Error> {
    Ok(RelationshipRecord {
        relationship_id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        relationship_type: row.get(3)?,
        properties: props_from_json(row.get(4)?),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        source_detail: None,
        target_detail: None,
    })
}
