//! Gemini `generateContent` client.
//!
//! History maps to `contents` (roles `user` / `model`), framing maps to
//! `systemInstruction`, and the reply is read from the first candidate.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use safesprint_core::config::CompletionConfig;
use safesprint_core::types::MessageRole;

use crate::{CompletionError, CompletionService, Turn};

/// HTTP client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Build a client from configuration, reading the API key from the
    /// environment variable named in `config.api_key_env`.
    ///
    /// A missing key is not an error here; it is reported on each call.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No completion API key configured; AI replies will fail"
            );
        }
        Self::new(config, api_key)
    }

    /// Build a client with an explicit key.
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

impl CompletionService for GeminiClient {
    async fn complete(
        &self,
        prior_turns: &[Turn],
        new_input: &str,
        framing: &str,
    ) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::MissingApiKey)?;
        let request = GenerateRequest::build(prior_turns, new_input, framing);

        debug!(
            model = %self.model,
            history = prior_turns.len(),
            "Sending completion request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: GenerateResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(CompletionError::MalformedResponse(e.to_string()));
            }
            Err(_) => {
                return Err(CompletionError::Service {
                    status: status.as_u16(),
                    message: status.to_string(),
                });
            }
        };

        if let Some(error) = parsed.error {
            return Err(CompletionError::Service {
                status: status.as_u16(),
                message: error.message,
            });
        }
        if !status.is_success() {
            return Err(CompletionError::Service {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text)
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

impl GenerateRequest {
    fn build(prior_turns: &[Turn], new_input: &str, framing: &str) -> Self {
        let mut contents: Vec<Content> = prior_turns
            .iter()
            .map(|turn| Content::text(Some(wire_role(turn.speaker)), &turn.text))
            .collect();
        contents.push(Content::text(Some("user"), new_input));

        let system_instruction =
            (!framing.trim().is_empty()).then(|| Content::text(None, framing));

        Self {
            contents,
            system_instruction,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Ai => "model",
    }
}
