use std::time::Duration;

use devpulse_core::{DevpulseError, LlmConfig};
use serde::{Deserialize, Serialize};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use devpulse_report::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Summarize this week");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes `/v1/chat/completions`: Groq, OpenAI
/// and Ollama are configured out of the box.
///
/// # Examples
///
/// ```
/// use devpulse_core::LlmConfig;
/// use devpulse_report::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.model(), "llama-3.1-8b-instant");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Config`] for an unsupported provider or when a
    /// hosted provider has no API key, and [`DevpulseError::Llm`] if the HTTP
    /// client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, DevpulseError> {
        let model = config.resolved_model()?;
        let base_url = config.resolved_base_url()?;

        if config.api_key.is_none() {
            if let Some(var) = config.api_key_env_var() {
                return Err(DevpulseError::Config(format!(
                    "{var} not set. Export it or set llm.api_key in .devpulse.toml"
                )));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DevpulseError::Llm(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{base_url}/v1/chat/completions"),
            model,
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion request and return the text response.
    ///
    /// # Errors
    ///
    /// Returns [`DevpulseError::Llm`] on HTTP errors or response parsing failures.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, DevpulseError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&self.endpoint);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "sending chat completion");
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| DevpulseError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DevpulseError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DevpulseError::Llm(format!("failed to parse response: {e}")))?;

        extract_content(&response_body)
    }
}

/// Pull the first choice's message text out of a completion response.
fn extract_content(response: &serde_json::Value) -> Result<String, DevpulseError> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| DevpulseError::Llm(format!("unexpected response structure: {response}")))
}
