//! Read-only ontology and schema catalog.
//!
//! Declarative rows seeded by migration, read by callers to validate their
//! own creates before issuing them. The store itself does not consult this
//! catalog unless the service-level enforcement hook is enabled.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::Db;
use crate::error::{DataGraphError, Result};

/// A declared entity type and its backing collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeRow {
    pub type_name: String,
    pub table_name: String,
    pub description: Option<String>,
}

/// A declared property of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypePropertyRow {
    pub type_name: String,
    pub property_name: String,
    pub data_type: String,
    pub required: bool,
    pub description: Option<String>,
}

/// A declared valid relationship between two entity types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipOntologyRow {
    pub relationship_type: String,
    pub source_type: String,
    pub target_type: String,
    pub description: Option<String>,
}

/// List all declared entity types.
pub async fn list_entity_types(db: &Db) -> Result<Vec<EntityTypeRow>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT type_name, table_name, description FROM entity_types ORDER BY type_name",
        )?;
        let rows: Vec<EntityTypeRow> = stmt
            .query_map([], |row| {
                Ok(EntityTypeRow {
                    type_name: row.get(0)?,
                    table_name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(DataGraphError::Database)?;
        Ok(rows)
    })
    .await
}

/// List the declared properties of one entity type.
pub async fn list_entity_type_properties(
    db: &Db,
    entity_type: &str,
) -> Result<Vec<EntityTypePropertyRow>> {
    let entity_type = entity_type.to_string();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT type_name, property_name, data_type, required, description
             FROM entity_type_properties WHERE type_name = ?1 ORDER BY property_name",
        )?;
        let rows: Vec<EntityTypePropertyRow> = stmt
            .query_map(params![entity_type], |row| {
                Ok(EntityTypePropertyRow {
                    type_name: row.get(0)?,
                    property_name: row.get(1)?,
                    data_type: row.get(2)?,
                    required: row.get::<_, i64>(3)? != 0,
                    description: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(DataGraphError::Database)?;
        Ok(rows)
    })
    .await
}

/// List the full relationship ontology.
pub async fn list_relationship_ontology(db: &Db) -> Result<Vec<RelationshipOntologyRow>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT relationship_type, source_type, target_type, description
             FROM relationship_ontology ORDER BY relationship_type, source_type, target_type",
        )?;
        let rows: Vec<RelationshipOntologyRow> = stmt
            .query_map([], |row| {
                Ok(RelationshipOntologyRow {
                    relationship_type: row.get(0)?,
                    source_type: row.get(1)?,
                    target_type: row.get(2)?,
                    description: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(DataGraphError::Database)?;
        Ok(rows)
    })
    .await
}

/// Whether a `(relationship_type, source_type, target_type)` triple is
/// declared in the ontology. Used by the optional enforcement hook.
pub async fn relationship_allowed(
    db: &Db,
    relationship_type: &str,
    source_type: &str,
    target_type: &str,
) -> Result<bool> {
    let relationship_type = relationship_type.to_string();
    let source_type = source_type.to_string();
    let target_type = target_type.to_string();

    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT 1 FROM relationship_ontology
             WHERE relationship_type = ?1 AND source_type = ?2 AND target_type = ?3",
        )?;
        Ok(stmt.exists(params![relationship_type, source_type, target_type])?)
    })
    .await
}
