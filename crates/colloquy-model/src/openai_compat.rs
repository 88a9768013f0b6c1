//! Generic driver for local OpenAI-compatible endpoints (MLX, LM Studio).
//!
//! Speaks `/v1/chat/completions` against a configurable base URL.  No API key
//! is required; an optional bearer token is supported for servers that gate
//! access.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    client::{ModelClient, TurnRequest},
    error::ClientError,
    openai::http_client,
    types::Role,
};

const MAX_TOKENS: u32 = 1024;

pub struct OpenAiCompatClient {
    backend_id: &'static str,
    model: String,
    base_url: String,
    bearer_token: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(backend_id: &'static str, model: String, base_url: String) -> Self {
        Self {
            backend_id,
            model,
            base_url,
            bearer_token: None,
            max_tokens: MAX_TOKENS,
            temperature: 0.7,
            client: http_client(),
        }
    }

    /// MLX server preset (`http://localhost:9999`).
    pub fn mlx(model: String) -> Self {
        Self::new("mlx", model, "http://localhost:9999".into())
    }

    /// LM Studio preset (`http://localhost:1234`).
    pub fn lmstudio(model: String) -> Self {
        Self::new("lmstudio", model, "http://localhost:1234".into())
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn build_body(&self, req: &TurnRequest) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if !req.system_instruction.is_empty() {
            messages.push(json!({ "role": "system", "content": req.system_instruction }));
        }
        for m in req.chat_history() {
            // History system messages fold into the system slot these servers
            // all accept; attachments degrade to text blocks.
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let mut content = m.content.clone();
            if let Some(att) = &m.attachment {
                content.push_str("\n\n");
                content.push_str(&att.as_text_block());
            }
            messages.push(json!({ "role": role, "content": content }));
        }
        let mut prompt = req.prompt.clone();
        if let Some(att) = &req.attachment {
            prompt.push_str("\n\n");
            prompt.push_str(&att.as_text_block());
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens.min(MAX_TOKENS),
            "stream": false,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(self.backend_static_id(), e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Request {
                backend: self.backend_static_id(),
                message: format!("{status}: {text}"),
            });
        }
        resp.json()
            .await
            .map_err(|e| ClientError::from_reqwest(self.backend_static_id(), e))
    }

    fn backend_static_id(&self) -> &'static str {
        self.backend_id
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn backend(&self) -> &str {
        self.backend_id
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        let body = self.build_body(&req);
        debug!(model = %self.model, backend = self.backend_id, "sending OpenAI-compatible request");
        let resp = self.post("/v1/chat/completions", &body).await?;
        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::BadResponse {
                backend: self.backend_static_id(),
                message: "no text in choices[0].message".into(),
            })
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "test" }],
            "stream": false,
        });
        self.post("/v1/chat/completions", &body).await.map(|_| ())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    fn req() -> TurnRequest {
        TurnRequest {
            prompt: "p".into(),
            system_instruction: "s".into(),
            history: vec![Message::user("u"), Message::assistant("a")],
            ..Default::default()
        }
    }

    #[test]
    fn mlx_preset_uses_its_port() {
        let c = OpenAiCompatClient::mlx("qwen2.5".into());
        assert_eq!(c.backend(), "mlx");
        assert_eq!(c.base_url, "http://localhost:9999");
    }

    #[test]
    fn lmstudio_preset_uses_its_port() {
        let c = OpenAiCompatClient::lmstudio("phi-3".into());
        assert_eq!(c.backend(), "lmstudio");
        assert_eq!(c.base_url, "http://localhost:1234");
    }

    #[test]
    fn body_caps_tokens_and_disables_streaming() {
        let c = OpenAiCompatClient::mlx("qwen2.5".into());
        let body = c.build_body(&req());
        assert_eq!(body["max_tokens"], MAX_TOKENS);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn instruction_then_history_then_prompt() {
        let c = OpenAiCompatClient::mlx("qwen2.5".into());
        let body = c.build_body(&req());
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[1]["content"], "u");
        assert_eq!(msgs[2]["content"], "a");
        assert_eq!(msgs[3]["content"], "p");
    }
}
