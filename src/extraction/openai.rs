use crate::error::{DataGraphError, Result};
use crate::extraction::{parse_graph_response, ExtractedGraph, GraphExtractor, EXTRACTION_PROMPT};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request structure for OpenAI chat completions API
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response structure from OpenAI chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// OpenAI-backed graph extractor
///
/// Sends the fixed extraction contract plus the document text to the chat
/// completions API and parses the structured JSON reply.
pub struct OpenAIExtractor {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAIExtractor {
    /// Create a new OpenAI extractor
    ///
    /// # Panics
    ///
    /// Panics if HTTP client cannot be created (should not happen in normal operation)
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl GraphExtractor for OpenAIExtractor {
    async fn extract_graph(&self, document_text: &str) -> Result<ExtractedGraph> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: EXTRACTION_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Document:\n---\n{}\n---", document_text),
                },
            ],
            temperature: 0.0,
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DataGraphError::Extraction(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(DataGraphError::Extraction(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| DataGraphError::Extraction(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                DataGraphError::Extraction("Empty response from OpenAI API".to_string())
            })?;

        log::debug!("Extraction API call took {:?}", start.elapsed());

        parse_graph_response(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_new() {
        let extractor = OpenAIExtractor::new("test-key".to_string(), "gpt-4o-mini".to_string());
        assert_eq!(extractor.model, "gpt-4o-mini");
    }

    // Integration tests for actual API calls would require a real API key
    // and should be run separately with proper test fixtures
}
