// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use colloquy_config::Mode;

use crate::{Attachment, ClientError, Message, Role};

/// Everything a backend needs to produce one turn.
///
/// `history` is a defensive copy owned by the request; clients translate it
/// into their wire shape and must never hand back a mutated view of it.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// The counterpart's previous response, or the core topic on the first turn.
    pub prompt: String,
    /// The per-turn system instruction computed by the manager.
    pub system_instruction: String,
    /// Conversation so far (already role-swapped by the manager when the mode
    /// calls for it).
    pub history: Vec<Message>,
    /// The side being generated this turn.
    pub role: Role,
    /// Interaction mode of the surrounding conversation.
    pub mode: Mode,
    /// Media carried by this turn's prompt.  Only the first user turn of a
    /// conversation ever sets this.
    pub attachment: Option<Attachment>,
}

impl TurnRequest {
    /// The history in backend-translation order.
    ///
    /// Role normalization (including dropping unknown tags) happens at the
    /// ingest boundary via [`Role::parse_loose`]; by the time a request is
    /// built, every message is in the neutral set.
    pub fn chat_history(&self) -> impl Iterator<Item = &Message> {
        self.history.iter()
    }
}

/// Uniform contract over heterogeneous LLM backends.
///
/// One implementation per backend; a factory keyed on the model id returns
/// the right variant.  Dispatch is explicit – no downcasting.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Backend family id (`openai`, `anthropic`, `google`, `ollama`, …).
    fn backend(&self) -> &str;

    /// Model identifier as reported to users and transcripts.
    fn model_name(&self) -> &str;

    /// Run one turn and return the decoded text, exactly once.
    ///
    /// Backends that yield a structured candidate array select candidate 0
    /// and its first text part before returning.
    async fn generate_response(&self, req: TurnRequest) -> Result<String, ClientError>;

    /// Cheap connectivity probe used before a run starts.
    async fn test_connection(&self) -> Result<(), ClientError>;

    /// Release backend resources.  Most HTTP clients have nothing to do here.
    fn close(&self) {}
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_history_keeps_all_neutral_roles() {
        let req = TurnRequest {
            history: vec![
                Message::system("s"),
                Message::user("u"),
                Message::assistant("a"),
            ],
            ..Default::default()
        };
        assert_eq!(req.chat_history().count(), 3);
    }

    #[test]
    fn default_request_is_empty_user_turn() {
        let req = TurnRequest::default();
        assert_eq!(req.role, Role::User);
        assert!(req.history.is_empty());
        assert!(req.prompt.is_empty());
    }
}
