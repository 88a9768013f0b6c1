// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Google Gemini driver – native Generative Language API.
//!
//! Uses the non-streaming `generateContent` endpoint; the decoded reply is
//! candidate 0's first text part.  Safety thresholds are relaxed to
//! `BLOCK_ONLY_HIGH` so adversarial role-play turns are not silently emptied.
//!
//! # Auth
//! API key via `?key=...` query param (`GOOGLE_API_KEY`).
//!
//! # Endpoint pattern
//! `POST https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent`

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    client::{ModelClient, TurnRequest},
    error::ClientError,
    openai::http_client,
    types::{Attachment, Role},
};

const MAX_OUTPUT_TOKENS: u32 = 1280;

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

pub struct GoogleClient {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl GoogleClient {
    pub fn new(model: String, api_key: Option<String>) -> Self {
        Self {
            model,
            api_key,
            base_url: "https://generativelanguage.googleapis.com".into(),
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.85,
            client: http_client(),
        }
    }

    fn build_body(&self, req: &TurnRequest) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        for m in req.chat_history() {
            // Gemini has no in-conversation system slot; history system
            // messages are dropped (the manager's instruction carries the topic).
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => continue,
            };
            contents.push(json!({ "role": role, "parts": message_parts(m) }));
        }
        let mut prompt_msg = crate::Message::user(req.prompt.clone());
        prompt_msg.attachment = req.attachment.clone();
        contents.push(json!({ "role": "user", "parts": message_parts(&prompt_msg) }));

        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|c| json!({ "category": c, "threshold": "BLOCK_ONLY_HIGH" }))
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens.min(MAX_OUTPUT_TOKENS),
                "candidateCount": 1,
            },
            "safetySettings": safety,
        });
        if !req.system_instruction.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": req.system_instruction }] });
        }
        body
    }
}

/// Convert a history message into Gemini `parts`, inlining media attachments.
fn message_parts(m: &crate::Message) -> Vec<Value> {
    let mut parts = vec![json!({ "text": m.content })];
    match &m.attachment {
        Some(Attachment::Image { mime, base64, .. }) => {
            parts.push(json!({ "inline_data": { "mime_type": mime, "data": base64 } }));
        }
        Some(Attachment::Video { mime, chunks, .. }) => {
            // Chunked upload: each 1 MiB slice is its own inline_data part.
            for chunk in chunks {
                parts.push(json!({ "inline_data": { "mime_type": mime, "data": chunk } }));
            }
        }
        Some(other @ (Attachment::Text { .. } | Attachment::Code { .. })) => {
            parts.push(json!({ "text": other.as_text_block() }));
        }
        None => {}
    }
    parts
}

/// Candidate 0, first text part.
fn extract_text(body: &Value) -> Result<String, ClientError> {
    body["candidates"][0]["content"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
        .map(str::to_string)
        .ok_or_else(|| ClientError::BadResponse {
            backend: "google",
            message: "no text part in candidates[0]".into(),
        })
}

#[async_trait]
impl ModelClient for GoogleClient {
    fn backend(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError> {
        let key = self.api_key.as_deref().ok_or(ClientError::MissingApiKey {
            backend: "google",
            env_var: "GOOGLE_API_KEY",
        })?;
        let body = self.build_body(&req);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            key
        );
        debug!(model = %self.model, "sending Google Gemini request");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest("google", e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Request {
                backend: "google",
                message: format!("{status}: {text}"),
            });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::from_reqwest("google", e))?;
        extract_text(&body)
    }

    async fn test_connection(&self) -> Result<(), ClientError> {
        let req = TurnRequest {
            prompt: "test".into(),
            ..Default::default()
        };
        self.generate_response(req).await.map(|_| ())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    fn req() -> TurnRequest {
        TurnRequest {
            prompt: "next".into(),
            system_instruction: "instr".into(),
            history: vec![
                Message::system("topic"),
                Message::user("Q"),
                Message::assistant("A"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn assistant_maps_to_model_role() {
        let c = GoogleClient::new("gemini-2.0-flash-exp".into(), None);
        let body = c.build_body(&req());
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn system_history_messages_are_dropped() {
        let c = GoogleClient::new("gemini-2.0-flash-exp".into(), None);
        let body = c.build_body(&req());
        // topic dropped; Q, A, prompt remain.
        assert_eq!(body["contents"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn system_instruction_block_is_set() {
        let c = GoogleClient::new("gemini-2.0-flash-exp".into(), None);
        let body = c.build_body(&req());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "instr");
    }

    #[test]
    fn generation_config_caps_tokens_and_candidates() {
        let c = GoogleClient::new("gemini-2.0-flash-exp".into(), None);
        let body = c.build_body(&req());
        assert_eq!(body["generationConfig"]["maxOutputTokens"], MAX_OUTPUT_TOKENS);
        assert_eq!(body["generationConfig"]["candidateCount"], 1);
        assert_eq!(body["generationConfig"]["temperature"], 0.85);
    }

    #[test]
    fn all_safety_categories_relaxed_to_block_only_high() {
        let c = GoogleClient::new("gemini-2.0-flash-exp".into(), None);
        let body = c.build_body(&req());
        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), SAFETY_CATEGORIES.len());
        for s in settings {
            assert_eq!(s["threshold"], "BLOCK_ONLY_HIGH");
        }
    }

    #[test]
    fn image_attachment_becomes_inline_data() {
        let att = Attachment::Image {
            mime: "image/png".into(),
            path: "p.png".into(),
            base64: "QUJD".into(),
            width: 1,
            height: 1,
        };
        let m = Message::user("look").with_attachment(att);
        let parts = message_parts(&m);
        assert_eq!(parts[0]["text"], "look");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "QUJD");
    }

    #[test]
    fn video_attachment_emits_one_part_per_chunk() {
        let att = Attachment::Video {
            mime: "video/mp4".into(),
            path: "v.mp4".into(),
            chunks: vec!["AA==".into(), "BB==".into(), "CC==".into()],
            chunk_count: 3,
            fps: None,
            resolution: None,
            duration_secs: None,
        };
        let m = Message::user("clip").with_attachment(att);
        let parts = message_parts(&m);
        // 1 text + 3 inline_data
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2]["inline_data"]["data"], "BB==");
    }

    #[test]
    fn extract_text_takes_candidate_zero_first_text_part() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "one" }, { "text": "two" } ] } },
                { "content": { "parts": [ { "text": "other-candidate" } ] } },
            ]
        });
        assert_eq!(extract_text(&body).unwrap(), "one");
    }

    #[test]
    fn extract_text_errors_on_empty_candidates() {
        let body = json!({ "candidates": [] });
        assert!(matches!(
            extract_text(&body),
            Err(ClientError::BadResponse { .. })
        ));
    }

    #[tokio::test]
    async fn missing_api_key_is_fatal_auth_at_first_use() {
        let c = GoogleClient::new("gemini-2.0-flash-exp".into(), None);
        let err = c.generate_response(req()).await.unwrap_err();
        assert_eq!(err.class(), crate::ErrorClass::FatalAuth);
    }
}
