// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Ollama driver – local process-hosted endpoints via the native `/api/chat`.
//!
//! Two presets cover the default daemon and a secondary low-power daemon:
//! the low-power preset trims the context window, prediction budget and
//! temperature so small quantised models stay responsive.
//!
//! History is bounded before the call – local models run with small context
//! windows and degrade sharply when older turns overflow them.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    client::{ModelClient, TurnRequest},
    error::ClientError,
    openai::http_client,
    types::Role,
};

/// Sampling and window options forwarded to the daemon.
#[derive(Debug, Clone)]
pub struct OllamaOptions {
    pub num_ctx: u32,
    pub num_predict: u32,
    pub temperature: f32,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub repeat_penalty: Option<f32>,
    /// Number of trailing history messages sent with each turn.
    pub history_window: usize,
}

impl OllamaOptions {
    /// Default daemon preset (`http://localhost:11434`).
    pub fn standard() -> Self {
        Self {
            num_ctx: 6132,
            num_predict: 768,
            temperature: 0.75,
            top_k: Some(30),
            top_p: None,
            repeat_penalty: Some(0.9),
            history_window: 5,
        }
    }

    /// Low-power daemon preset (`http://localhost:10434`).
    pub fn low_power() -> Self {
        Self {
            num_ctx: 4096,
            num_predict: 512,
            temperature: 0.65,
            top_k: None,
            top_p: Some(0.85),
            repeat_penalty: None,
            history_window: 8,
        }
    }
}

pub struct OllamaClient {
    backend_id: &'static str,
    model: String,
    base_url: String,
    options: OllamaOptions,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn standard(model: String) -> Self {
        Self {
            backend_id: "ollama",
            model,
            base_url: "http://localhost:11434".into(),
            options: OllamaOptions::standard(),
            client: http_client(),
        }
    }

    pub fn low_power(model: String) -> Self {
        Self {
            backend_id: "pico",
            model,
            base_url: "http://localhost:10434".into(),
            options: OllamaOptions::low_power(),
            client: http_client(),
        }
    }

    fn build_body(&self, req: &TurnRequest) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if !req.system_instruction.is_empty() {
            messages.push(json!({ "role": "system", "content": req.system_instruction }));
        }
        let recent: Vec<&crate::Message> = req
            .chat_history()
            .filter(|m| m.role != Role::System)
            .collect();
        let start = recent.len().saturating_sub(self.options.history_window);
        for m in &recent[start..] {
            let mut content = m.content.clone();
            if let Some(att) = &m.attachment {
                content.push_str("\n\n");
                content.push_str(&att.as_text_block());
            }
            messages.push(json!({ "role": m.role.as_str(), "content": content }));
        }
        let mut prompt = req.prompt.clone();
        if let Some(att) = &req.attachment {
            prompt.push_str("\n\n");
            prompt.push_str(&att.as_text_block());
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut options = json!({
            "num_ctx": self.options.num_ctx,
            "num_predict": self.options.num_predict,
            "temperature": self.options.temperature,
        });
        if let Some(k) = self.options.top_k {
            options["top_k"] = json!(k);
        }
        if let Some(p) = self.options.top_p {
            options["top_p"] = json!(p);
        }
        if let Some(r) = self.options.repeat_penalty {
            options["repeat_penalty"] = json!(r);
        }

        json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": options,
        })
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn backend(&self) -> &str {
        self.backend_id
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        let body = self.build_body(&req);
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        debug!(model = %self.model, backend = self.backend_id, "sending Ollama request");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest("ollama", e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Request {
                backend: "ollama",
                message: format!("{status}: {text}"),
            });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::from_reqwest("ollama", e))?;
        body["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::BadResponse {
                backend: "ollama",
                message: "no message.content in response".into(),
            })
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest("ollama", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Request {
                backend: "ollama",
                message: format!("tags probe failed: {}", resp.status()),
            });
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    fn req_with_turns(n: usize) -> TurnRequest {
        let mut history = vec![Message::system("topic")];
        for i in 0..n {
            if i % 2 == 0 {
                history.push(Message::user(format!("u{i}")));
            } else {
                history.push(Message::assistant(format!("a{i}")));
            }
        }
        TurnRequest {
            prompt: "next".into(),
            system_instruction: "instr".into(),
            history,
            ..Default::default()
        }
    }

    #[test]
    fn standard_preset_options() {
        let c = OllamaClient::standard("phi4:latest".into());
        let body = c.build_body(&req_with_turns(2));
        assert_eq!(body["options"]["num_ctx"], 6132);
        assert_eq!(body["options"]["num_predict"], 768);
        assert_eq!(body["options"]["temperature"], 0.75);
        assert_eq!(body["options"]["top_k"], 30);
        assert_eq!(body["options"]["repeat_penalty"], 0.9);
        assert!(body["options"].get("top_p").is_none());
    }

    #[test]
    fn low_power_preset_options() {
        let c = OllamaClient::low_power("qwen-mini".into());
        assert_eq!(c.backend(), "pico");
        let body = c.build_body(&req_with_turns(2));
        assert_eq!(body["options"]["num_ctx"], 4096);
        assert_eq!(body["options"]["num_predict"], 512);
        assert_eq!(body["options"]["temperature"], 0.65);
        assert_eq!(body["options"]["top_p"], 0.85);
        assert!(body["options"].get("top_k").is_none());
    }

    #[test]
    fn history_is_bounded_to_window() {
        let c = OllamaClient::standard("phi4:latest".into());
        let body = c.build_body(&req_with_turns(12));
        let messages = body["messages"].as_array().unwrap();
        // system instruction + 5-message window + prompt
        assert_eq!(messages.len(), 1 + 5 + 1);
        // The window keeps the most recent turns.
        assert_eq!(messages[1]["content"], "a7");
    }

    #[test]
    fn request_is_non_streaming() {
        let c = OllamaClient::standard("phi4:latest".into());
        let body = c.build_body(&req_with_turns(2));
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn system_instruction_is_prepended() {
        let c = OllamaClient::standard("phi4:latest".into());
        let body = c.build_body(&req_with_turns(2));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "instr");
    }
}
