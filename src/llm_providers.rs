use anyhow::{Result, anyhow};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

/// Common message structure for chat-style requests
#[derive(Debug, Clone, Serialize)]
pub struct LLMMessage {
    pub role: String,
    pub content: String,
}

/// One completion call: which model, what to say, how adventurous to be.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system_message: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
}

/// Enum-based provider implementation
#[derive(Debug, Clone)]
pub enum LLMProvider {
    OpenAI(OpenAIProvider),
    Gemini(GeminiProvider),
}

impl LLMProvider {
    /// Send one completion request and return the provider's raw response body.
    pub async fn make_request(&self, request: &CompletionRequest<'_>) -> Result<Value> {
        match self {
            LLMProvider::OpenAI(provider) => provider.make_request(request).await,
            LLMProvider::Gemini(provider) => provider.make_request(request).await,
        }
    }

    /// Lightweight capability check used once at startup.
    pub async fn probe(&self) -> Result<()> {
        match self {
            LLMProvider::OpenAI(provider) => provider.probe().await,
            LLMProvider::Gemini(provider) => provider.probe().await,
        }
    }

    /// Get the provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI(provider) => provider.provider_name(),
            LLMProvider::Gemini(provider) => provider.provider_name(),
        }
    }
}

/// Turn a non-2xx response into an error carrying the status line and body,
/// so callers can inspect e.g. `401` or `insufficient_quota`.
async fn error_for_status(provider: &'static str, action: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    error!(
        provider = provider,
        status = %status,
        error = %error_text,
        "LLM API {} failed", action
    );
    Err(anyhow!("{} API {} failed ({}): {}", provider, action, status, error_text))
}

/// OpenAI-compatible chat-completions provider
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<LLMMessage>,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub async fn make_request(&self, request: &CompletionRequest<'_>) -> Result<Value> {
        let request_body = OpenAIRequest {
            model: request.model,
            messages: vec![
                LLMMessage {
                    role: "system".to_string(),
                    content: request.system_message.to_string(),
                },
                LLMMessage {
                    role: "user".to_string(),
                    content: request.prompt.to_string(),
                },
            ],
            temperature: request.temperature,
        };

        info!(
            provider = self.provider_name(),
            model = %request.model,
            base_url = %self.base_url,
            prompt_length = request.prompt.len(),
            "Making LLM request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let response = error_for_status(self.provider_name(), "request", response).await?;
        Ok(response.json::<Value>().await?)
    }

    pub async fn probe(&self) -> Result<()> {
        debug!(provider = self.provider_name(), base_url = %self.base_url, "Probing model listing");

        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        error_for_status(self.provider_name(), "probe", response).await?;
        Ok(())
    }

    pub fn provider_name(&self) -> &'static str {
        "OpenAI"
    }
}

/// Gemini `generateContent` provider
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub async fn make_request(&self, request: &CompletionRequest<'_>) -> Result<Value> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: format!("{}\n\n{}", request.system_message, request.prompt),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: 2048,
            },
        };

        info!(
            provider = self.provider_name(),
            model = %request.model,
            base_url = %self.base_url,
            prompt_length = request.prompt.len(),
            "Making LLM request"
        );

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, request.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        let response = error_for_status(self.provider_name(), "request", response).await?;
        Ok(response.json::<Value>().await?)
    }

    pub async fn probe(&self) -> Result<()> {
        debug!(provider = self.provider_name(), base_url = %self.base_url, "Probing model listing");

        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        error_for_status(self.provider_name(), "probe", response).await?;
        Ok(())
    }

    pub fn provider_name(&self) -> &'static str {
        "Gemini"
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Pull the generated text out of a provider response body.
///
/// Shapes are tried in a fixed order: the typed chat-completion object, a
/// plain path lookup of `choices[0].message.content` (string or list of text
/// parts), then Gemini's `candidates[0].content.parts[0].text`.
pub fn extract_completion_text(body: &Value) -> Option<String> {
    if let Ok(completion) = ChatCompletion::deserialize(body) {
        if let Some(content) = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
        {
            return Some(content);
        }
    }

    match body.pointer("/choices/0/message/content") {
        Some(Value::String(content)) => return Some(content.clone()),
        Some(Value::Array(parts)) => {
            let text: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if !text.is_empty() {
                return Some(text);
            }
        }
        _ => {}
    }

    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Helpers for reading JSON the model was asked to produce
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Strip one Markdown code fence (```json ... ``` or ``` ... ```) wrapping
    /// the whole reply. Anything else is returned trimmed but untouched.
    pub fn strip_code_fence(content: &str) -> &str {
        let trimmed = content.trim();
        let Some(inner) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        let Some(inner) = inner.strip_suffix("```") else {
            return trimmed;
        };
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        inner.trim()
    }
}

/// Factory for creating providers based on provider type
pub struct LLMProviderFactory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LLMProviderType {
    OpenAI,
    Gemini,
}

impl LLMProviderType {
    /// Map a configured provider name; unknown names fall back to OpenAI.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => LLMProviderType::Gemini,
            "openai" | "chatgpt" | "gpt" => LLMProviderType::OpenAI,
            _ => {
                info!("Unknown LLM provider '{}', defaulting to OpenAI", name);
                LLMProviderType::OpenAI
            }
        }
    }
}

impl LLMProviderFactory {
    pub fn create_provider(
        provider_type: LLMProviderType,
        api_key: String,
        base_url: Option<String>,
    ) -> LLMProvider {
        match provider_type {
            LLMProviderType::OpenAI => LLMProvider::OpenAI(OpenAIProvider::new(api_key, base_url)),
            LLMProviderType::Gemini => LLMProvider::Gemini(GeminiProvider::new(api_key, base_url)),
        }
    }
}
