use crate::error::GenerationError;
use crate::llm::LlmClient;
use crate::prompts::SYSTEM_PROMPT;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const FENCE: &str = "```";

/// Single round trip to the configured model: prompt in, JSON out.
///
/// No caching and no retry; every `invoke` is at most one provider call.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    provider: String,
    llm: Option<Arc<dyn LlmClient>>,
}

impl GenerationClient {
    pub fn new(provider: impl Into<String>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            provider: provider.into(),
            llm,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub async fn invoke(&self, prompt: &str) -> Result<Value, GenerationError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| GenerationError::Configuration(self.provider.clone()))?;

        debug!("Invoking {} ({} prompt chars)", self.provider, prompt.len());
        let raw = llm
            .chat(SYSTEM_PROMPT, prompt)
            .await
            .map_err(|e| GenerationError::Upstream(format!("{:#}", e)))?;

        let payload = extract_json(&raw);
        serde_json::from_str(payload)
            .map_err(|e| GenerationError::parse(format!("invalid JSON: {}", e), &raw))
    }

    /// `invoke` followed by decoding into `T`.
    pub async fn invoke_as<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, GenerationError> {
        let value = self.invoke(prompt).await?;
        decode(value)
    }
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GenerationError> {
    let raw = value.to_string();
    serde_json::from_value(value)
        .map_err(|e| GenerationError::parse(format!("unexpected shape: {}", e), &raw))
}

/// Pulls the JSON payload out of a model reply. A block fenced as `json` wins
/// over any other fenced block; otherwise the first fenced block is used. A
/// language tag on the opening fence is dropped.
pub fn extract_json(text: &str) -> &str {
    let json_fence = format!("{}json", FENCE);
    let open = text
        .to_ascii_lowercase()
        .find(&json_fence)
        .or_else(|| text.find(FENCE));
    let Some(open) = open else {
        return text.trim();
    };

    let after_open = &text[open + FENCE.len()..];
    let inner = match after_open.find(FENCE) {
        Some(close) => &after_open[..close],
        None => after_open,
    };

    strip_language_tag(inner).trim()
}

fn strip_language_tag(block: &str) -> &str {
    match block.find('\n') {
        Some(newline) => {
            let tag = block[..newline].trim();
            if tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                &block[newline + 1..]
            } else {
                block
            }
        }
        None => {
            let trimmed = block.trim_start();
            let tag_len = trimmed
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(trimmed.len());
            &trimmed[tag_len..]
        }
    }
}
