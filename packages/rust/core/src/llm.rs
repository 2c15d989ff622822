//! Language-model collaborator and the Gemini REST client.
//!
//! The orchestrator only sees [`LanguageModel`]: a system instruction and a
//! user message in, generated text or a [`ModelError`] out. One attempt per
//! call, no retries.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use sourcechat_shared::{AppConfig, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Failure of a model call. Rendered inline as `[Gemini API error: ...]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Connection, timeout, or body read failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// Provider answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Response carried no candidate text (e.g. blocked by safety filters).
    #[error("response contained no text")]
    EmptyResponse,

    /// Any other provider-reported fault.
    #[error("{0}")]
    Provider(String),
}

impl ModelError {
    /// Bracketed inline form returned to the user as the answer.
    pub fn marker(&self) -> String {
        format!("[Gemini API error: {self}]")
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a reply to `user` under the `system` instruction.
    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, ModelError>;

    /// Model identifier for tracing.
    fn model_id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Wire types (generateContent)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemContent<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.3,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    /// Build from app config, reading the key from the configured env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Ok(Self::new(api_key, &config.gemini.model)
            .with_temperature(config.gemini.temperature)
            .with_base_url(&config.gemini.base_url))
    }

    /// Set a custom base URL (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model, system_len = system.len(), user_len = user.len()))]
    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, ModelError> {
        let request = GenerateRequest {
            system_instruction: (!system.is_empty()).then(|| SystemContent {
                parts: vec![Part { text: system }],
            }),
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: user }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(format!("body read failed: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        debug!(answer_len = text.len(), "model replied");
        Ok(text.to_string())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key", "gemini-2.5-flash").with_base_url(server.uri())
    }

    #[test]
    fn model_error_marker() {
        let err = ModelError::Provider("quota exceeded".into());
        assert_eq!(err.marker(), "[Gemini API error: quota exceeded]");

        let err = ModelError::Api {
            status: 429,
            message: "Resource exhausted".into(),
        };
        assert_eq!(err.marker(), "[Gemini API error: HTTP 429: Resource exhausted]");
    }

    #[test]
    fn request_serializes_in_gemini_shape() {
        let request = GenerateRequest {
            system_instruction: Some(SystemContent {
                parts: vec![Part { text: "be brief" }],
            }),
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: GenerationConfig { temperature: 0.5 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn empty_system_instruction_is_omitted() {
        let request = GenerateRequest {
            system_instruction: None,
            contents: vec![],
            generation_config: GenerationConfig { temperature: 0.3 },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("systemInstruction"));
    }

    #[tokio::test]
    async fn complete_returns_joined_trimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "You are a helpful assistant."}]},
                "contents": [{"role": "user", "parts": [{"text": "What is X?"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "  X is "}, {"text": "Y.\n"}]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = client_for(&server)
            .complete("You are a helpful assistant.", "What is X?")
            .await
            .unwrap();
        assert_eq!(answer, "X is Y.");
    }

    #[tokio::test]
    async fn api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("", "hi").await.unwrap_err();
        assert_eq!(
            err,
            ModelError::Api {
                status: 400,
                message: "API key not valid".into()
            }
        );
    }

    #[tokio::test]
    async fn no_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).complete("", "hi").await.unwrap_err();
        assert_eq!(err, ModelError::EmptyResponse);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("", "hi").await.unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn from_config_requires_key() {
        let mut config = AppConfig::default();
        config.gemini.api_key_env = "SC_TEST_MISSING_GEMINI_KEY_98765".into();
        assert!(GeminiClient::from_config(&config).is_err());
    }
}
