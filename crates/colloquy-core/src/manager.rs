// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The conversation manager: owns the history, drives the turn loop, and
//! routes backend failures through the retry policy.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use colloquy_config::{DiscussionConfig, Mode, SpeakerRole};
use colloquy_instruct::{AdaptiveInstructionManager, TOKENS_PER_TURN};
use colloquy_model::{
    client_for, swap_history_roles, Attachment, ClientError, ErrorClass, Message, ModelClient,
    Role, TurnRequest,
};

use crate::{
    rate_limit::RateLimiter,
    report::{write_fatal_report, FatalReport},
    topic::extract_core_topic,
    ConversationError,
};

/// Retries after the first attempt (three attempts total).
pub const MAX_RETRIES: u32 = 2;

/// Backoff unit; attempt N sleeps N × this before the next attempt.
const RETRY_BACKOFF_UNIT: Duration = Duration::from_secs(5);

/// Explicit run parameters threaded through to artifacts and the arbiter –
/// no process-wide globals.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub goal: String,
    pub mode: Mode,
    pub human_model: String,
    pub ai_model: String,
    pub rounds: u32,
}

/// A fatal turn outcome bubbling up to the retry driver.
#[derive(Debug)]
struct TurnFailure {
    model: String,
    role: Role,
    error: ClientError,
}

#[derive(Default)]
struct ClientCache {
    clients: HashMap<String, Arc<dyn ModelClient>>,
    initialized: HashSet<String>,
}

pub struct ConversationManager {
    /// Stable id for correlating this manager's runs in logs and artifacts.
    run_id: String,
    config: DiscussionConfig,
    conversation_history: Vec<Message>,
    cache: Mutex<ClientCache>,
    rate_limiter: RateLimiter,
    instructions: AdaptiveInstructionManager,
    output_dir: PathBuf,
}

impl ConversationManager {
    pub fn new(config: DiscussionConfig) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            config,
            conversation_history: Vec::new(),
            cache: Mutex::new(ClientCache::default()),
            rate_limiter: RateLimiter::default(),
            instructions: AdaptiveInstructionManager::new(),
            output_dir: PathBuf::from("."),
        }
    }

    /// Build a manager from a discussion config file.
    pub fn from_config(path: &Path) -> anyhow::Result<Self> {
        let config = colloquy_config::load(Some(path))?;
        Ok(Self::new(config))
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn config(&self) -> &DiscussionConfig {
        &self.config
    }

    pub fn history(&self) -> &[Message] {
        &self.conversation_history
    }

    /// Resolve which configured model plays which side.
    ///
    /// Explicit `role:` assignments win; models without one are assigned in
    /// id order, human side first.  A single-model config plays both sides.
    pub fn resolve_run_context(&self) -> Result<RunContext, ConversationError> {
        let mut ids: Vec<&str> = self.config.models.keys().map(String::as_str).collect();
        ids.sort_unstable();
        if ids.is_empty() {
            return Err(ConversationError::NoModels);
        }
        let type_of = |id: &str| self.config.models[id].model_type.clone();
        let human = self
            .config
            .model_for_role(SpeakerRole::Human)
            .map(type_of)
            .unwrap_or_else(|| type_of(ids[0]));
        let ai = self
            .config
            .model_for_role(SpeakerRole::Ai)
            .map(type_of)
            .unwrap_or_else(|| type_of(ids.get(1).copied().unwrap_or(ids[0])));
        Ok(RunContext {
            goal: self.config.goal.clone(),
            mode: self.config.mode,
            human_model: human,
            ai_model: ai,
            rounds: self.config.rounds,
        })
    }

    // ── Client cache ──────────────────────────────────────────────────────────

    /// Look up or lazily construct the client for a model id.
    /// Unknown ids return `None`; the turn fails gracefully.
    fn ensure_client(&self, model_id: &str) -> Option<Arc<dyn ModelClient>> {
        let mut cache = self.cache.lock().expect("client cache poisoned");
        if let Some(client) = cache.clients.get(model_id) {
            return Some(client.clone());
        }
        let spec = self
            .config
            .models
            .values()
            .find(|s| s.model_type == model_id);
        let client: Arc<dyn ModelClient> = Arc::from(client_for(model_id, spec)?);
        cache.clients.insert(model_id.to_string(), client.clone());
        cache.initialized.insert(model_id.to_string());
        debug!(model = model_id, "client initialised lazily");
        Some(client)
    }

    /// Pre-wire a client for a model id (tests inject scripted backends here).
    pub fn insert_client(&self, model_id: impl Into<String>, client: Arc<dyn ModelClient>) {
        let mut cache = self.cache.lock().expect("client cache poisoned");
        let id = model_id.into();
        cache.initialized.insert(id.clone());
        cache.clients.insert(id, client);
    }

    /// Drop every cached client; the next turn re-initialises lazily.
    pub fn cleanup_unused_clients(&self) {
        let mut cache = self.cache.lock().expect("client cache poisoned");
        for client in cache.clients.values() {
            client.close();
        }
        cache.clients.clear();
        cache.initialized.clear();
    }

    pub fn cached_client_count(&self) -> usize {
        self.cache.lock().expect("client cache poisoned").clients.len()
    }

    /// Probe every listed model once; logs and returns false on any failure.
    pub async fn validate_connections(&self, model_ids: &[&str]) -> bool {
        let mut all_ok = true;
        for id in model_ids {
            match self.ensure_client(id) {
                Some(client) => match client.test_connection().await {
                    Ok(()) => info!(model = id, "connection validated"),
                    Err(e) => {
                        warn!(model = id, error = %e, "connection validation failed");
                        all_ok = false;
                    }
                },
                None => {
                    warn!(model = id, "no backend for model id");
                    all_ok = false;
                }
            }
        }
        all_ok
    }

    // ── Conversation driving ──────────────────────────────────────────────────

    /// Drive a full conversation and return the completed history.
    ///
    /// `human_instruction` / `ai_instruction` override the fixed minimal
    /// instruction in `no-meta-prompting`; the adaptive manager computes the
    /// instructions in every other mode.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_conversation(
        &mut self,
        initial_prompt: &str,
        human_model: &str,
        ai_model: &str,
        mode: Mode,
        human_instruction: Option<&str>,
        ai_instruction: Option<&str>,
        rounds: u32,
    ) -> Result<Vec<Message>, ConversationError> {
        self.run_with_attachment(
            initial_prompt,
            human_model,
            ai_model,
            mode,
            human_instruction,
            ai_instruction,
            rounds,
            None,
        )
        .await
    }

    /// Like [`run_conversation`], with a file attached to the first human turn.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_conversation_with_file(
        &mut self,
        initial_prompt: &str,
        human_model: &str,
        ai_model: &str,
        mode: Mode,
        human_instruction: Option<&str>,
        ai_instruction: Option<&str>,
        rounds: u32,
        file_path: &Path,
    ) -> Result<Vec<Message>, ConversationError> {
        let attachment = colloquy_media::process_file(file_path)?;
        info!(kind = attachment.kind(), path = %file_path.display(), "attachment ingested");
        self.run_with_attachment(
            initial_prompt,
            human_model,
            ai_model,
            mode,
            human_instruction,
            ai_instruction,
            rounds,
            Some(attachment),
        )
        .await
    }

    /// The retry driver around one conversation.
    ///
    /// Connection-classified failures restart the whole conversation with
    /// progressive backoff; auth/quota failures abort with a fatal report;
    /// exhaustion degrades to a two-message error history.
    #[allow(clippy::too_many_arguments)]
    async fn run_with_attachment(
        &mut self,
        initial_prompt: &str,
        human_model: &str,
        ai_model: &str,
        mode: Mode,
        human_instruction: Option<&str>,
        ai_instruction: Option<&str>,
        rounds: u32,
        attachment: Option<Attachment>,
    ) -> Result<Vec<Message>, ConversationError> {
        let core_topic = extract_core_topic(initial_prompt);
        info!(run = %self.run_id, %mode, rounds, topic = %core_topic, "starting conversation");

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .attempt_conversation(
                    &core_topic,
                    human_model,
                    ai_model,
                    mode,
                    human_instruction,
                    ai_instruction,
                    rounds,
                    attachment.clone(),
                )
                .await;

            let failure = match result {
                Ok(history) => return Ok(history),
                Err(failure) => failure,
            };

            let class = failure.error.class();
            if class.aborts_run() {
                self.write_fatal(&failure, mode, &core_topic);
                return Err(ConversationError::Fatal {
                    model: failure.model,
                    class,
                    source: failure.error,
                });
            }

            // FatalConnection from here on.
            if attempt < MAX_RETRIES {
                attempt += 1;
                let backoff = RETRY_BACKOFF_UNIT * attempt;
                warn!(
                    attempt,
                    model = %failure.model,
                    error = %failure.error,
                    ?backoff,
                    "connection failure, retrying conversation"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            warn!(model = %failure.model, error = %failure.error, "retries exhausted");
            self.write_fatal(&failure, mode, &core_topic);
            let degraded = vec![
                Message::system(initial_prompt),
                Message::system(format!(
                    "ERROR: {} – conversation could not be completed.",
                    failure.error
                )),
            ];
            self.conversation_history = degraded.clone();
            return Ok(degraded);
        }
    }

    /// One full pass over the turn loop.  Fatal failures abort the pass;
    /// everything else lands in the history and the loop continues.
    #[allow(clippy::too_many_arguments)]
    async fn attempt_conversation(
        &mut self,
        core_topic: &str,
        human_model: &str,
        ai_model: &str,
        mode: Mode,
        human_instruction: Option<&str>,
        ai_instruction: Option<&str>,
        rounds: u32,
        mut attachment: Option<Attachment>,
    ) -> Result<Vec<Message>, TurnFailure> {
        self.conversation_history.clear();
        self.conversation_history.push(Message::system(core_topic));

        for round in 0..rounds {
            debug!(round, "starting round");
            // Human-side turn; the attachment rides on the first one only.
            self.take_turn(
                Role::User,
                human_model,
                mode,
                core_topic,
                human_instruction,
                attachment.take(),
            )
            .await?;
            // AI-side turn.
            self.take_turn(
                Role::Assistant,
                ai_model,
                mode,
                core_topic,
                ai_instruction,
                None,
            )
            .await?;
        }
        Ok(self.conversation_history.clone())
    }

    /// One model invocation producing one appended message.
    async fn take_turn(
        &mut self,
        role: Role,
        model_id: &str,
        mode: Mode,
        domain: &str,
        instruction_override: Option<&str>,
        attachment: Option<Attachment>,
    ) -> Result<(), TurnFailure> {
        let Some(client) = self.ensure_client(model_id) else {
            // Unknown id: record the failed turn and keep the loop alive.
            let msg = "unknown model id – no backend available".to_string();
            warn!(model = model_id, "turn skipped: no backend for model id");
            self.conversation_history
                .push(Message::system(format!("Error with {model_id}: {msg}")));
            self.conversation_history.push(Message {
                role,
                content: msg,
                attachment: None,
            });
            return Ok(());
        };

        let system_instruction = match mode {
            Mode::NoMetaPrompting => instruction_override
                .map(str::to_string)
                .unwrap_or_else(minimal_instruction),
            _ => self.instructions.generate_instructions(
                &self.conversation_history,
                domain,
                mode,
                role,
            ),
        };

        // The human-persona side in human-aiai sees the counterpart's turns
        // as if a user had written them; the assistant side always sees the
        // natural history.  ai-ai never swaps: identity is instruction-only.
        let history_for_client = match (mode, role) {
            (Mode::HumanAiAi, Role::User) => swap_history_roles(&self.conversation_history),
            _ => self.conversation_history.clone(),
        };

        let prompt = self
            .conversation_history
            .iter()
            .rev()
            .find(|m| m.role == role.swapped())
            .map(|m| m.content.clone())
            .unwrap_or_else(|| domain.to_string());

        self.rate_limiter.acquire().await;

        let request = TurnRequest {
            prompt,
            system_instruction,
            history: history_for_client,
            role,
            mode,
            attachment: attachment.clone(),
        };

        match client.generate_response(request).await {
            Ok(text) => {
                debug!(%role, model = model_id, chars = text.len(), "turn completed");
                self.conversation_history.push(Message {
                    role,
                    content: text,
                    attachment,
                });
                Ok(())
            }
            Err(error) => match error.class() {
                ErrorClass::Transient | ErrorClass::NonFatal => {
                    warn!(%role, model = model_id, %error, "non-fatal turn failure");
                    self.conversation_history.push(Message::system(format!(
                        "Error with {}: {error}",
                        client.model_name()
                    )));
                    self.conversation_history.push(Message {
                        role,
                        content: error.to_string(),
                        attachment: None,
                    });
                    Ok(())
                }
                _ => Err(TurnFailure {
                    model: client.model_name().to_string(),
                    role,
                    error,
                }),
            },
        }
    }

    fn write_fatal(&self, failure: &TurnFailure, mode: Mode, domain: &str) {
        let report = FatalReport {
            message: failure.error.to_string(),
            model: failure.model.clone(),
            role: failure.role,
            mode,
            domain: domain.to_string(),
            message_count: self.conversation_history.len(),
            details: vec![format!("{:?}", failure.error)],
        };
        if let Err(e) = write_fatal_report(&self.output_dir, &report) {
            warn!(error = %e, "could not write fatal error report");
        }
    }
}

/// Fixed instruction used for both sides in `no-meta-prompting`.
fn minimal_instruction() -> String {
    format!(
        "You are a helpful assistant. Think step by step as needed. \
         RESTRICT OUTPUTS TO APPROX {TOKENS_PER_TURN} tokens"
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
