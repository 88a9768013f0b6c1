// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Anthropic driver – native Messages API.
//!
//! The system instruction travels in the top-level `system` field; history
//! `system` messages are dropped at translation time (the manager keeps the
//! core topic in the instruction it computes per turn).
//!
//! # Auth
//! API key via `x-api-key` header plus a pinned `anthropic-version`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    client::{ModelClient, TurnRequest},
    error::ClientError,
    openai::http_client,
    types::{Attachment, Role},
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1536;

pub struct AnthropicClient {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    /// Extended-thinking budget; `Some` enables the thinking block and pins
    /// temperature at 1.0 (API requirement).
    thinking_budget: Option<u32>,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(model: String, api_key: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: "https://api.anthropic.com".into(),
            max_tokens: MAX_TOKENS,
            temperature: 0.85,
            thinking_budget: None,
            client: http_client(),
        }
    }

    pub fn with_extended_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = Some(budget_tokens);
        self
    }

    fn build_body(&self, req: &TurnRequest) -> Value {
        let mut messages: Vec<Value> = req
            .chat_history()
            .filter(|m| m.role != Role::System)
            .map(|m| message_value(m.role.as_str(), &m.content, m.attachment.as_ref()))
            .collect();
        messages.push(message_value("user", &req.prompt, req.attachment.as_ref()));

        // With thinking enabled, max_tokens must cover the thinking budget
        // plus the visible reply; otherwise clamp to the chat-tier cap.
        let max_tokens = match self.thinking_budget {
            Some(budget) => budget + self.max_tokens.min(MAX_TOKENS),
            None => self.max_tokens.min(MAX_TOKENS),
        };
        let mut body = json!({
            "model": self.model,
            "system": req.system_instruction,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": if self.thinking_budget.is_some() { 1.0 } else { self.temperature },
        });
        if let Some(budget) = self.thinking_budget {
            body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
        }
        body
    }

    async fn post_messages(&self, body: &Value) -> Result<Value, ClientError> {
        let key = self.api_key.as_deref().ok_or(ClientError::MissingApiKey {
            backend: "anthropic",
            env_var: "ANTHROPIC_API_KEY",
        })?;
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest("anthropic", e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Request {
                backend: "anthropic",
                message: format!("{status}: {text}"),
            });
        }
        resp.json()
            .await
            .map_err(|e| ClientError::from_reqwest("anthropic", e))
    }
}

/// Serialize one message; an image attachment becomes a base64 source block,
/// other attachment kinds fold into the text.
fn message_value(role: &str, content: &str, attachment: Option<&Attachment>) -> Value {
    match attachment {
        Some(Attachment::Image { mime, base64, .. }) => json!({
            "role": role,
            "content": [
                { "type": "text", "text": content },
                { "type": "image",
                  "source": { "type": "base64", "media_type": mime, "data": base64 } },
            ],
        }),
        Some(other) => json!({
            "role": role,
            "content": format!("{content}\n\n{}", other.as_text_block()),
        }),
        None => json!({ "role": role, "content": content }),
    }
}

/// Select the first `text` block from the response content array.
/// With extended thinking enabled the array starts with `thinking` blocks,
/// so a positional `content[0]` read would return the wrong part.
fn extract_text(body: &Value) -> Result<String, ClientError> {
    body["content"]
        .as_array()
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b["type"] == "text")
                .and_then(|b| b["text"].as_str())
        })
        .map(str::to_string)
        .ok_or_else(|| ClientError::BadResponse {
            backend: "anthropic",
            message: "no text block in response content".into(),
        })
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn backend(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        let body = self.build_body(&req);
        debug!(model = %self.model, thinking = self.thinking_budget.is_some(),
               "sending Anthropic request");
        let resp = self.post_messages(&body).await?;
        extract_text(&resp)
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "test" }],
            "max_tokens": 8,
        });
        self.post_messages(&body).await.map(|_| ())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    fn req() -> TurnRequest {
        TurnRequest {
            prompt: "go on".into(),
            system_instruction: "persona".into(),
            history: vec![
                Message::system("topic"),
                Message::user("A"),
                Message::assistant("B"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn system_instruction_travels_top_level() {
        let c = AnthropicClient::new("claude-3-7-sonnet".into(), None);
        let body = c.build_body(&req());
        assert_eq!(body["system"], "persona");
    }

    #[test]
    fn history_system_messages_are_dropped() {
        let c = AnthropicClient::new("claude-3-7-sonnet".into(), None);
        let body = c.build_body(&req());
        let messages = body["messages"].as_array().unwrap();
        // topic dropped; A, B, prompt remain
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["content"], "A");
        assert_eq!(messages[1]["content"], "B");
    }

    #[test]
    fn default_sampling_matches_chat_tier() {
        let c = AnthropicClient::new("claude-3-7-sonnet".into(), None);
        let body = c.build_body(&req());
        assert_eq!(body["temperature"], 0.85);
        assert_eq!(body["max_tokens"], MAX_TOKENS);
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn extended_thinking_pins_temperature_and_sets_budget() {
        let c = AnthropicClient::new("claude-3-7-sonnet".into(), None)
            .with_extended_thinking(4096);
        let body = c.build_body(&req());
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 4096);
        // The output cap covers the thinking budget plus the visible reply.
        assert_eq!(body["max_tokens"], 4096 + 1536);
    }

    #[test]
    fn image_attachment_becomes_base64_source_block() {
        let att = Attachment::Image {
            mime: "image/jpeg".into(),
            path: "p.jpg".into(),
            base64: "QUJD".into(),
            width: 1,
            height: 1,
        };
        let mut r = req();
        r.history[1] = Message::user("look").with_attachment(att);
        let c = AnthropicClient::new("claude-3-7-sonnet".into(), None);
        let body = c.build_body(&r);
        let first = &body["messages"][0];
        assert_eq!(first["content"][1]["type"], "image");
        assert_eq!(first["content"][1]["source"]["media_type"], "image/jpeg");
    }

    #[test]
    fn extract_text_skips_thinking_blocks() {
        let body = json!({
            "content": [
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "answer" },
            ]
        });
        assert_eq!(extract_text(&body).unwrap(), "answer");
    }

    #[test]
    fn extract_text_errors_on_empty_content() {
        let body = json!({ "content": [] });
        assert!(matches!(
            extract_text(&body),
            Err(ClientError::BadResponse { .. })
        ));
    }

    #[tokio::test]
    async fn missing_api_key_is_fatal_auth_at_first_use() {
        let c = AnthropicClient::new("claude-3-7-sonnet".into(), None);
        let err = c.generate_response(req()).await.unwrap_err();
        assert_eq!(err.class(), crate::ErrorClass::FatalAuth);
    }
}
