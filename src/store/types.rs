use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The five entity collections of the privacy data graph.
///
/// Each kind maps to its own table so collections can be listed and
/// vector-ranked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Asset,
    ProcessingActivity,
    DataElement,
    DataSubjectType,
    Vendor,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Asset,
        EntityKind::ProcessingActivity,
        EntityKind::DataElement,
        EntityKind::DataSubjectType,
        EntityKind::Vendor,
    ];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Asset => "assets",
            EntityKind::ProcessingActivity => "processing_activities",
            EntityKind::DataElement => "data_elements",
            EntityKind::DataSubjectType => "data_subject_types",
            EntityKind::Vendor => "vendors",
        }
    }

    /// The entity type tag used by the extraction contract and the ontology catalog
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Asset => "Asset",
            EntityKind::ProcessingActivity => "ProcessingActivity",
            EntityKind::DataElement => "DataElement",
            EntityKind::DataSubjectType => "DataSubjectType",
            EntityKind::Vendor => "Vendor",
        }
    }

    /// Resolve an extraction type tag (exact match)
    pub fn from_type_name(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.type_name() == tag)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// Lenient parse for CLI / caller input: case-insensitive, accepts the
    /// type tag, the table name, and simple plural forms (e.g. "Assets").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase().replace(['-', '_'], "");
        let kind = match lowered.as_str() {
            "asset" | "assets" => EntityKind::Asset,
            "processingactivity" | "processingactivities" => EntityKind::ProcessingActivity,
            "dataelement" | "dataelements" => EntityKind::DataElement,
            "datasubjecttype" | "datasubjecttypes" => EntityKind::DataSubjectType,
            "vendor" | "vendors" => EntityKind::Vendor,
            _ => return Err(format!("Unknown entity type: {}", s)),
        };
        Ok(kind)
    }
}

/// A persisted entity as exposed to callers.
///
/// The stored embedding is deliberately absent: it is internal ranking state,
/// never a caller-visible value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: String,
    pub name: String,
    pub description: Option<String>,
    pub properties: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for an entity. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub properties: Option<Map<String, Value>>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.properties.is_none()
    }

    /// Whether this patch changes the embedding input
    pub fn touches_embedding(&self) -> bool {
        self.name.is_some() || self.description.is_some()
    }
}

/// Resolved endpoint details attached to relationships on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDetail {
    pub name: String,
    pub entity_type: String,
}

/// A directed, typed edge between two entity identifiers.
///
/// `relationship_id` is the unambiguous address for mutation; the
/// `(source_id, target_id)` pair remains a query key but can match several
/// edges when multiple types exist between the same ordered pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub relationship_id: String,
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: String,
    pub properties: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_detail: Option<EndpointDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_detail: Option<EndpointDetail>,
}

/// Partial update for a relationship.
#[derive(Debug, Clone, Default)]
pub struct RelationshipPatch {
    pub relationship_type: Option<String>,
    pub properties: Option<Map<String, Value>>,
}

impl RelationshipPatch {
    pub fn is_empty(&self) -> bool {
        self.relationship_type.is_none() && self.properties.is_none()
    }
}

/// A similarity search hit, ranked by ascending cosine distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarEntity {
    pub entity_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Cosine distance in [0, 2]; 0 is identical direction
    pub distance: f32,
}

/// Current UTC timestamp in RFC 3339, assigned by the store at write time.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Serialize a property map to JSON text.
///
/// Serialization of a string-keyed map cannot realistically fail; if it ever
/// does the map is stored as its debug rendering rather than rejected,
/// preserving availability over strictness.
pub(crate) fn props_to_json(props: Option<&Map<String, Value>>) -> Option<String> {
    props.map(|m| {
        serde_json::to_string(m).unwrap_or_else(|_| Value::String(format!("{:?}", m)).to_string())
    })
}

/// Parse stored property JSON text.
///
/// Unparsable text is surfaced as a raw string value instead of an error.
pub(crate) fn props_from_json(raw: Option<String>) -> Option<Value> {
    raw.map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s)))
}
