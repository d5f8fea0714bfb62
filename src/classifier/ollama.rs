use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Classification, Classifier, CollaboratorError, ThemeNamer};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "deepseek-v3.1:671b-cloud";

const CLASSIFY_SYSTEM_PROMPT: &str = "You are a document classifier. \
Reply strictly with a JSON object {\"type\": ..., \"date\": ..., \"keywords\": [...]}.";

const NAME_SYSTEM_PROMPT: &str = "Generate a short folder name (two words at most) \
from the document type and keywords. Reply strictly with JSON: {\"name\": \"...\"}.";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Chat-completion client for an Ollama-compatible endpoint
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct NameReply {
    name: String,
}

impl OllamaClient {
    /// Fails if the HTTP client cannot be built with the configured timeout
    pub fn new(config: OllamaConfig) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn chat_url(&self) -> String {
        let host = self.config.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/api/chat", host)
        } else {
            format!("http://{}/api/chat", host)
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "stream": false,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self.http.post(self.chat_url()).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::Status(response.status().as_u16()));
        }

        let reply: ChatResponse = response.json().await?;
        Ok(reply.message.content)
    }
}

#[async_trait]
impl Classifier for OllamaClient {
    async fn classify(
        &self,
        preview: &str,
        file_name: &str,
    ) -> Result<Classification, CollaboratorError> {
        let prompt = format!(
            "Analyze this document ({}):\n\n<<<\n{}\n>>>\n\n\
             Return exactly this JSON:\n{{\"type\": \"...\", \"date\": \"...\", \"keywords\": [\"...\", \"...\"]}}",
            file_name, preview
        );
        let raw = self.chat(CLASSIFY_SYSTEM_PROMPT, &prompt).await?;
        parse_json_reply(&raw)
    }
}

#[async_trait]
impl ThemeNamer for OllamaClient {
    async fn name_theme(
        &self,
        doc_type: &str,
        keywords: &[String],
    ) -> Result<String, CollaboratorError> {
        let prompt = format!("Type: {}\nKeywords: {}", doc_type, keywords.join(", "));
        let raw = self.chat(NAME_SYSTEM_PROMPT, &prompt).await?;
        let reply: NameReply = parse_json_reply(&raw)?;
        Ok(reply.name)
    }
}

/// Parse a model reply, tolerating a surrounding Markdown code fence
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, CollaboratorError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(CollaboratorError::Malformed("empty reply".to_string()));
    }
    Ok(serde_json::from_str(body)?)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let inner = trimmed.trim_matches('`').trim();
    match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim(),
        _ => inner,
    }
}
