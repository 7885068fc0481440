//! LLM Gateway — the single point of entry for all model calls in Parley.
//!
//! ARCHITECTURAL RULE: No other module may talk to an LLM provider directly.
//! All agent calls MUST go through [`Gateway::call_json`], which enforces
//! JSON output against the caller's schema, retries with repair prompts, and
//! applies the per-route configuration from the registry.
//!
//! Logging covers route name, attempt count, and failure kind only — never
//! prompt or completion bodies.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{LlmRoute, ResponseFormat};

pub mod prompts;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned status {status}")]
    Api { status: u16 },

    #[error("output failed validation: {0}")]
    Invalid(String),

    #[error("provider returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Transport-level failures are retried in place; validation failures
    /// get a repair prompt instead.
    fn transient(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::Timeout | LlmError::EmptyContent => true,
            LlmError::Api { status } => *status == 429 || *status >= 500,
            LlmError::Invalid(_) => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            LlmError::Transport(_) => "transport",
            LlmError::Timeout => "timeout",
            LlmError::Api { .. } => "api",
            LlmError::Invalid(_) => "invalid",
            LlmError::EmptyContent => "empty",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// The only network egress of the engine. Implemented over reqwest in
/// production and scripted in tests.
#[async_trait]
pub trait LlmTransport: Send + Sync {
    async fn chat(
        &self,
        route: &LlmRoute,
        api_key: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP transport (chat-completions wire format)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ResponseFormatBody<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmTransport for HttpTransport {
    async fn chat(
        &self,
        route: &LlmRoute,
        api_key: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &route.model,
            messages,
            response_format: match route.response_format {
                ResponseFormat::JsonObject => Some(ResponseFormatBody {
                    format_type: "json_object",
                }),
                ResponseFormat::Text => None,
            },
            temperature: route.temperature,
            top_p: route.top_p,
        };

        let url = format!("{}{}", route.base_url, route.endpoint);
        let mut request = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_millis(route.timeout_ms))
            .json(&body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gateway
// ────────────────────────────────────────────────────────────────────────────

/// Shared gateway handed to every agent. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn LlmTransport>,
    api_key_env: String,
}

impl Gateway {
    pub fn new(transport: Arc<dyn LlmTransport>, api_key_env: String) -> Self {
        Gateway {
            transport,
            api_key_env,
        }
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }

    /// Calls the route and deserializes the reply as `T`.
    ///
    /// Transient transport failures retry with exponential backoff; parse or
    /// validation failures retry with a repair prompt carrying the malformed
    /// output and the schema. Both count against `route.max_retries`.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        route: &LlmRoute,
        system: &str,
        task: &str,
        schema_hint: &str,
    ) -> Result<T, LlmError> {
        let system = format!(
            "{system}\n\n{}\n{schema_hint}",
            prompts::JSON_SCHEMA_PREAMBLE
        );
        let mut messages = vec![ChatMessage::system(system), ChatMessage::user(task)];
        let api_key = self.api_key();

        let attempts = route.max_retries + 1;
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                // Exponential backoff: 1s, 2s, 4s...
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 2)));
                tokio::time::sleep(delay).await;
            }

            let raw = match self
                .transport
                .chat(route, api_key.as_deref(), &messages)
                .await
            {
                Ok(raw) => raw,
                Err(err) if err.transient() => {
                    warn!(
                        route = %route.name,
                        attempt,
                        kind = err.kind(),
                        "LLM call failed, retrying"
                    );
                    last_error = Some(err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let cleaned = peel_code_fence(&raw);
            match serde_json::from_str::<T>(cleaned) {
                Ok(parsed) => {
                    debug!(route = %route.name, attempt, "LLM call succeeded");
                    return Ok(parsed);
                }
                Err(err) => {
                    warn!(
                        route = %route.name,
                        attempt,
                        kind = "invalid",
                        "LLM output failed schema validation"
                    );
                    messages.push(ChatMessage::assistant(raw));
                    messages.push(ChatMessage::user(repair_prompt(
                        &err.to_string(),
                        schema_hint,
                    )));
                    last_error = Some(LlmError::Invalid(err.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::EmptyContent))
    }
}

/// Composes the follow-up sent after a reply failed validation.
fn repair_prompt(error: &str, schema_hint: &str) -> String {
    let mut reason = error.lines().next().unwrap_or_default().to_string();
    if reason.len() > 200 {
        reason.truncate(197);
        reason.push_str("...");
    }
    format!(
        "The previous reply failed validation. Reason: {reason}.\n\
         Return a single JSON object matching this schema:\n{schema_hint}"
    )
}

/// Models sometimes wrap the reply in a markdown fence despite the JSON-only
/// instruction. Peel one fence layer, tolerating a language tag after the
/// opening backticks; anything unfenced passes through untouched.
fn peel_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let rest = match trimmed.strip_prefix("```") {
        Some(rest) => rest,
        None => return trimmed,
    };
    // the opening line may carry a tag ("json"); the payload starts after it
    let inner = match rest.split_once('\n') {
        Some((_tag, body)) => body,
        None => rest,
    };
    let inner = inner.trim();
    match inner.strip_suffix("```") {
        Some(body) => body.trim(),
        None => inner,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted transport for tests
// ────────────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_route;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        key: String,
    }

    #[test]
    fn test_peel_code_fence_removes_tagged_fence() {
        let reply = "```json\n{\"projects\": {\"System Design\": \"event bus rebuild\"}}\n```";
        assert_eq!(
            peel_code_fence(reply),
            "{\"projects\": {\"System Design\": \"event bus rebuild\"}}"
        );
    }

    #[test]
    fn test_peel_code_fence_removes_bare_fence() {
        let reply = "```\n{\"answer\": \"We sharded by tenant.\", \"tone\": \"neutral\"}\n```";
        assert_eq!(
            peel_code_fence(reply),
            "{\"answer\": \"We sharded by tenant.\", \"tone\": \"neutral\"}"
        );
    }

    #[test]
    fn test_peel_code_fence_passes_unfenced_replies_through() {
        let reply = "  {\"summary\": \"strong on scaling stories\"}\n";
        assert_eq!(
            peel_code_fence(reply),
            "{\"summary\": \"strong on scaling stories\"}"
        );
    }

    #[test]
    fn test_peel_code_fence_handles_single_line_fence() {
        assert_eq!(
            peel_code_fence("```{\"rubric_filled\": false}```"),
            "{\"rubric_filled\": false}"
        );
    }

    #[test]
    fn test_peel_code_fence_tolerates_missing_closing_fence() {
        assert_eq!(
            peel_code_fence("```json\n{\"hints\": []}"),
            "{\"hints\": []}"
        );
    }

    #[tokio::test]
    async fn test_valid_reply_parses_first_attempt() {
        let gateway = testing::gateway_with(vec![Ok("{\"key\": \"value\"}".to_string())]);
        let parsed: Sample = gateway
            .call_json(&test_route("t"), "system", "task", "{\"key\": \"...\"}")
            .await
            .unwrap();
        assert_eq!(parsed.key, "value");
    }

    #[tokio::test]
    async fn test_malformed_reply_is_repaired_on_retry() {
        let gateway = testing::gateway_with(vec![
            Ok("this is not json".to_string()),
            Ok("{\"key\": \"fixed\"}".to_string()),
        ]);
        let parsed: Sample = gateway
            .call_json(&test_route("t"), "system", "task", "{\"key\": \"...\"}")
            .await
            .unwrap();
        assert_eq!(parsed.key, "fixed");
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_invalid() {
        let gateway = testing::gateway_with(vec![
            Ok("nope".to_string()),
            Ok("still nope".to_string()),
        ]);
        let result: Result<Sample, _> = gateway
            .call_json(&test_route("t"), "system", "task", "{}")
            .await;
        assert!(matches!(result, Err(LlmError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_transient_transport_failure_retries() {
        let gateway = testing::gateway_with(vec![
            Err(LlmError::Timeout),
            Ok("{\"key\": \"after-timeout\"}".to_string()),
        ]);
        let parsed: Sample = gateway
            .call_json(&test_route("t"), "system", "task", "{}")
            .await
            .unwrap();
        assert_eq!(parsed.key, "after-timeout");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let gateway = testing::gateway_with(vec![
            Err(LlmError::Api { status: 400 }),
            Ok("{\"key\": \"unreachable\"}".to_string()),
        ]);
        let result: Result<Sample, _> = gateway
            .call_json(&test_route("t"), "system", "task", "{}")
            .await;
        assert!(matches!(result, Err(LlmError::Api { status: 400 })));
    }

    #[tokio::test]
    async fn test_fenced_reply_is_accepted() {
        let gateway =
            testing::gateway_with(vec![Ok("```json\n{\"key\": \"fenced\"}\n```".to_string())]);
        let parsed: Sample = gateway
            .call_json(&test_route("t"), "system", "task", "{}")
            .await
            .unwrap();
        assert_eq!(parsed.key, "fenced");
    }
}
