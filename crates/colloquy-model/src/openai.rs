// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! OpenAI driver – chat completions plus the o-series reasoning tier.
//!
//! Both tiers share the `/chat/completions` wire format; the reasoning tier
//! pins temperature at 1.0, raises the output cap, sends `reasoning_effort`,
//! and folds the system instruction into a `developer` message (o-series
//! models reject a plain `system` slot).
//!
//! # Auth
//! Bearer token from `OPENAI_API_KEY`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    client::{ModelClient, TurnRequest},
    error::ClientError,
    types::{Attachment, Role},
    REQUEST_TIMEOUT,
};

/// Hard output-token ceilings per tier.
const CHAT_MAX_TOKENS: u32 = 1536;
const REASONING_MAX_TOKENS: u32 = 13192;

pub struct OpenAiClient {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    /// `Some(effort)` selects the reasoning tier.
    reasoning_effort: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Hosted chat-tier client (`gpt-4o` and friends).
    pub fn chat(model: String, api_key: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: CHAT_MAX_TOKENS,
            temperature: 0.85,
            reasoning_effort: None,
            client: http_client(),
        }
    }

    /// Reasoning-tier client (`o1`, `o3`, …).
    pub fn reasoning(model: String, api_key: Option<String>, effort: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: REASONING_MAX_TOKENS,
            temperature: 1.0,
            reasoning_effort: Some(effort.unwrap_or_else(|| "high".into())),
            client: http_client(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn is_reasoning(&self) -> bool {
        self.reasoning_effort.is_some()
    }

    /// Role tag for instruction-carrying messages: the reasoning tier has no
    /// `system` slot and takes `developer` instead.
    fn instruction_role(&self) -> &'static str {
        if self.is_reasoning() {
            "developer"
        } else {
            "system"
        }
    }

    fn build_messages(&self, req: &TurnRequest) -> Vec<Value> {
        let mut messages = Vec::new();
        if !req.system_instruction.is_empty() {
            messages.push(json!({
                "role": self.instruction_role(),
                "content": req.system_instruction,
            }));
        }
        for m in req.chat_history() {
            let role = match m.role {
                Role::System => self.instruction_role(),
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(message_json(role, &m.content, m.attachment.as_ref()));
        }
        messages.push(message_json("user", &req.prompt, req.attachment.as_ref()));
        messages
    }

    fn build_body(&self, req: &TurnRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.build_messages(req),
            "temperature": self.temperature,
            "stream": false,
        });
        if let Some(effort) = &self.reasoning_effort {
            body["max_completion_tokens"] = json!(self.max_tokens.min(REASONING_MAX_TOKENS));
            body["reasoning_effort"] = json!(effort);
        } else {
            body["max_tokens"] = json!(self.max_tokens.min(CHAT_MAX_TOKENS));
        }
        body
    }

    async fn post_chat(&self, body: &Value) -> Result<Value, ClientError> {
        let key = self.api_key.as_deref().ok_or(ClientError::MissingApiKey {
            backend: "openai",
            env_var: "OPENAI_API_KEY",
        })?;
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest("openai", e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Request {
                backend: "openai",
                message: format!("{status}: {text}"),
            });
        }
        resp.json()
            .await
            .map_err(|e| ClientError::from_reqwest("openai", e))
    }
}

/// Serialize one history message; an image attachment becomes a multi-part
/// content array with a data-URL `image_url` entry, other attachment kinds
/// are folded into the text.
fn message_json(role: &str, content: &str, attachment: Option<&Attachment>) -> Value {
    match attachment {
        Some(Attachment::Image { mime, base64, .. }) => json!({
            "role": role,
            "content": [
                { "type": "text", "text": content },
                { "type": "image_url",
                  "image_url": { "url": format!("data:{mime};base64,{base64}") } },
            ],
        }),
        Some(other) => json!({
            "role": role,
            "content": format!("{content}\n\n{}", other.as_text_block()),
        }),
        None => json!({ "role": role, "content": content }),
    }
}

fn extract_text(body: &Value) -> Result<String, ClientError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ClientError::BadResponse {
            backend: "openai",
            message: "no text in choices[0].message".into(),
        })
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("reqwest client construction cannot fail with static options")
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn backend(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        let body = self.build_body(&req);
        debug!(model = %self.model, reasoning = self.is_reasoning(), "sending OpenAI request");
        let resp = self.post_chat(&body).await?;
        extract_text(&resp)
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "test" }],
            "max_tokens": 8,
            "stream": false,
        });
        self.post_chat(&body).await.map(|_| ())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
