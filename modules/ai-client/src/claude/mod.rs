mod client;
pub(crate) mod types;

use std::time::Duration;

use tracing::debug;

use crate::error::{AiError, Result};
use crate::schema::StructuredOutput;
use crate::util::strip_code_blocks;

use client::ClaudeClient;
use types::{ChatRequest, ToolDefinitionWire, WireMessage};

const STRUCTURED_TOOL: &str = "structured_response";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a structured request when the caller wants to keep malformed output.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    /// The model answered within the schema.
    Structured(T),
    /// The model answered, but not in a shape that deserializes into `T`.
    Unstructured(String),
}

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-request timeout applied at the HTTP layer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> Result<ClaudeClient> {
        let client = ClaudeClient::new(&self.api_key, self.timeout)?;
        Ok(match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }

    fn structured_request<T: StructuredOutput>(&self, system: String, user: String) -> ChatRequest {
        ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .forced_tool(ToolDefinitionWire {
                name: STRUCTURED_TOOL.to_string(),
                description: "Return the answer as structured data.".to_string(),
                input_schema: T::tool_schema(),
            })
    }

    // =========================================================================
    // Convenience methods
    // =========================================================================

    /// Request a structured answer but hand back the raw text when it does not
    /// deserialize. Transport and API failures are still errors.
    pub async fn extract_or_text<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<Extraction<T>> {
        let request = self.structured_request::<T>(system_prompt.into(), user_prompt.into());
        let response = self.client()?.chat(&request).await?;

        if let Some(input) = response.tool_input(STRUCTURED_TOOL) {
            return Ok(match serde_json::from_value::<T>(input.clone()) {
                Ok(value) => Extraction::Structured(value),
                Err(e) => {
                    debug!(error = %e, "Tool input did not match schema");
                    Extraction::Unstructured(input.to_string())
                }
            });
        }

        // Some models ignore tool_choice and answer inline, occasionally as fenced JSON.
        let text = response
            .text()
            .ok_or_else(|| AiError::EmptyResponse("no tool use or text in Claude response".into()))?;
        Ok(match serde_json::from_str::<T>(strip_code_blocks(&text)) {
            Ok(value) => Extraction::Structured(value),
            Err(_) => Extraction::Unstructured(text),
        })
    }

    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .max_tokens(2048)
            .temperature(0.0);

        let response = self.client()?.chat(&request).await?;

        response
            .text()
            .ok_or_else(|| AiError::EmptyResponse("no text in Claude response".into()))
    }
}
