//! Graph extraction: turn raw document text into a typed node/edge list.
//!
//! The extraction contract is fixed: nodes are tagged with one of the five
//! entity types and edges reference nodes by name. A malformed or unparsable
//! model response is a hard error - ingestion never guesses at a partial
//! graph.

pub mod openai;

pub use openai::OpenAIExtractor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DataGraphError, Result};

/// A node extracted from a document, keyed by a caller-chosen name string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedNode {
    /// Unique name within the document (e.g. "Acme CRM")
    pub id: String,
    /// One of the five entity type tags
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

/// An edge extracted from a document, referencing nodes by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEdge {
    pub source: String,
    pub target: String,
    pub relationship_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

/// The structured output of a graph extraction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedGraph {
    #[serde(default)]
    pub nodes: Vec<ExtractedNode>,
    #[serde(default)]
    pub relationships: Vec<ExtractedEdge>,
}

/// Graph extraction provider - all text-generation backends implement this.
#[async_trait]
pub trait GraphExtractor: Send + Sync {
    /// Extract a node/edge list from raw document text.
    async fn extract_graph(&self, document_text: &str) -> Result<ExtractedGraph>;
}

/// The fixed extraction instruction sent to the text-generation capability.
pub(crate) const EXTRACTION_PROMPT: &str = r#"You are an expert at building knowledge graphs for data governance and privacy regulations. Your task is to extract information from the provided document according to a specific schema.

Schema & Topology Rules:
1. Identify and classify entities into one of five types:
   - Asset: A system, application, or database (e.g., 'CRM Platform', 'Production Aurora DB').
   - ProcessingActivity: A business process that uses data (e.g., 'User Authentication', 'Monthly Newsletter Campaign').
   - DataElement: A specific category of personal data (e.g., 'Contact Info', 'Financial Info', 'IP Address').
   - DataSubjectType: A category of individual (e.g., 'Customer', 'Employee', 'Patient').
   - Vendor: A third-party company or service.
2. Identify the relationships between these entities. Common relationships include:
   - A 'ProcessingActivity' PROCESSES_DATA_FROM an 'Asset'.
   - An 'Asset' CONTAINS 'DataElements'.
   - A 'DataElement' BELONGS_TO a 'DataSubjectType'.
   - An 'Asset' TRANSFERS_TO a 'Vendor'.

Output Format:
- Return a single, valid JSON object with 'nodes' and 'relationships' keys. Do not include any other text.
- 'nodes' is a list of objects, each with 'id' (a unique name) and 'type', plus optional 'description' and 'properties'.
- 'relationships' is a list of objects, each with 'source' (name), 'target' (name), and 'relationship_type'."#;

/// Parse a model response into an [`ExtractedGraph`].
///
/// Tolerates markdown code fences around the JSON body; anything else that
/// fails to parse is an extraction error.
pub fn parse_graph_response(raw: &str) -> Result<ExtractedGraph> {
    let cleaned = strip_code_fences(raw);

    serde_json::from_str(cleaned)
        .map_err(|e| DataGraphError::Extraction(format!("Failed to parse model response: {}", e)))
}

/// Strip surrounding ```json ... ``` fences, if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let raw = r#"{"nodes":[{"id":"Acme CRM","type":"Asset"}],"relationships":[]}"#;
        let graph = parse_graph_response(raw).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, "Acme CRM");
        assert_eq!(graph.nodes[0].entity_type, "Asset");
        assert!(graph.relationships.is_empty());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"nodes\":[{\"id\":\"X\",\"type\":\"Vendor\"}],\"relationships\":[{\"source\":\"A\",\"target\":\"X\",\"relationship_type\":\"TRANSFERS_TO\"}]}\n```";
        let graph = parse_graph_response(raw).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].relationship_type, "TRANSFERS_TO");
    }

    #[test]
    fn test_parse_bare_fence() {
        let raw = "```\n{\"nodes\":[],\"relationships\":[]}\n```";
        let graph = parse_graph_response(raw).unwrap();
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_parse_malformed_is_error() {
        let raw = "Sorry, I couldn't extract a graph from that document.";
        let result = parse_graph_response(raw);
        assert!(matches!(result, Err(DataGraphError::Extraction(_))));
    }

    #[test]
    fn test_parse_missing_keys_defaults_empty() {
        let graph = parse_graph_response("{}").unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.relationships.is_empty());
    }

    #[test]
    fn test_parse_node_with_properties() {
        let raw = r#"{"nodes":[{"id":"DB","type":"Asset","description":"prod db","properties":{"contains_pii":true}}],"relationships":[]}"#;
        let graph = parse_graph_response(raw).unwrap();
        let node = &graph.nodes[0];
        assert_eq!(node.description.as_deref(), Some("prod db"));
        let props = node.properties.as_ref().unwrap();
        assert_eq!(props.get("contains_pii"), Some(&serde_json::json!(true)));
    }
}
