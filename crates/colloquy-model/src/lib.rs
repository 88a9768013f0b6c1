// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Uniform model-client contract over heterogeneous LLM backends, plus the
//! error classifier that drives the conversation manager's recovery policy.

pub mod registry;
mod anthropic;
mod client;
mod error;
mod google;
mod mock;
mod ollama;
mod openai;
mod openai_compat;
mod types;

pub use anthropic::AnthropicClient;
pub use client::{ModelClient, TurnRequest};
pub use error::{classify, ClientError, ErrorClass};
pub use google::GoogleClient;
pub use mock::{MockClient, ScriptedClient};
pub use ollama::{OllamaClient, OllamaOptions};
pub use openai::OpenAiClient;
pub use openai_compat::OpenAiCompatClient;
pub use registry::{get_backend, list_backends, resolve_api_key, BackendMeta};
pub use types::{swap_history_roles, Attachment, Message, Role};

use colloquy_config::ModelSpec;

/// Per-request wall-clock budget shared by every backend.
pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(90);

/// Construct the backend client for a model id.
///
/// The id prefix selects the variant: `claude-*` → Anthropic, `gemini-*` →
/// Google, `o1*`/`o3*` → OpenAI reasoning tier, `gpt-*`/`chatgpt-*` → OpenAI
/// chat, `ollama:*`/`pico:*` → local Ollama daemons, `mlx:*`/`lmstudio:*` →
/// local OpenAI-compatible servers, `mock*` → test mock.
///
/// Unknown ids return `None`; the manager reports the turn as failed without
/// tearing down the process.  API keys are resolved from the registry env
/// vars here but their absence only surfaces on the first request.
pub fn client_for(model_type: &str, spec: Option<&ModelSpec>) -> Option<Box<dyn ModelClient>> {
    let id = model_type.trim();
    let lower = id.to_ascii_lowercase();

    if lower.starts_with("claude") {
        let mut client = AnthropicClient::new(id.to_string(), resolve_api_key("anthropic"));
        if let Some(spec) = spec {
            if spec.extended_thinking {
                client = client.with_extended_thinking(spec.budget_tokens.unwrap_or(4096));
            }
        }
        return Some(Box::new(client));
    }
    if lower.starts_with("gemini") {
        return Some(Box::new(GoogleClient::new(
            id.to_string(),
            resolve_api_key("google"),
        )));
    }
    if lower.starts_with("o1") || lower.starts_with("o3") {
        let effort = spec.and_then(|s| s.reasoning_level.clone());
        return Some(Box::new(OpenAiClient::reasoning(
            id.to_string(),
            resolve_api_key("openai"),
            effort,
        )));
    }
    if lower.starts_with("gpt") || lower.starts_with("chatgpt") {
        return Some(Box::new(OpenAiClient::chat(
            id.to_string(),
            resolve_api_key("openai"),
        )));
    }
    if let Some(model) = lower.strip_prefix("ollama:") {
        return Some(Box::new(OllamaClient::standard(model.to_string())));
    }
    if let Some(model) = lower.strip_prefix("pico:") {
        return Some(Box::new(OllamaClient::low_power(model.to_string())));
    }
    if let Some(model) = lower.strip_prefix("mlx:") {
        return Some(Box::new(OpenAiCompatClient::mlx(model.to_string())));
    }
    if let Some(model) = lower.strip_prefix("lmstudio:") {
        return Some(Box::new(OpenAiCompatClient::lmstudio(model.to_string())));
    }
    if lower == "mock" || lower.starts_with("mock:") {
        return Some(Box::new(MockClient));
    }
    None
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
