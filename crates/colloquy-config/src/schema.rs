// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_rounds() -> u32 {
    3
}

/// One discussion run: the goal, how many rounds to drive, which interaction
/// mode to use, and the participating model endpoints.
///
/// ```yaml
/// goal: "GOAL: Design a fault-tolerant task queue (sketch the wire protocol)"
/// rounds: 4
/// mode: human-aiai
/// models:
///   model1:
///     type: claude-3-7-sonnet
///     role: human
///   model2:
///     type: gemini-2.0-flash-exp
///     role: ai
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionConfig {
    /// Free-form topic or goal statement.  `Topic:` / `GOAL:` markers inside
    /// this string drive core-topic extraction at conversation start.
    #[serde(default)]
    pub goal: String,
    /// Number of rounds.  One round is a human-side turn followed by an
    /// AI-side turn.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Interaction mode for this run.
    #[serde(default)]
    pub mode: Mode,
    /// Participating models keyed by an arbitrary id (`model1`, `model2`, …).
    #[serde(default)]
    pub models: HashMap<String, ModelSpec>,
    /// Optional file attached to the first human turn (image, text, code or
    /// video).  Relative paths are resolved against the working directory.
    #[serde(default)]
    pub input_file: Option<String>,
}

impl Default for DiscussionConfig {
    fn default() -> Self {
        Self {
            goal: String::new(),
            rounds: default_rounds(),
            mode: Mode::default(),
            models: HashMap::new(),
            input_file: None,
        }
    }
}

impl DiscussionConfig {
    /// Structural validation, run once after loading and before any network
    /// activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.goal.trim().is_empty() {
            return Err(ConfigError::MissingKey("goal"));
        }
        if self.rounds < 1 {
            return Err(ConfigError::InvalidRounds(self.rounds));
        }
        if self.models.is_empty() {
            return Err(ConfigError::MissingKey("models"));
        }
        for (id, spec) in &self.models {
            if spec.model_type.trim().is_empty() {
                return Err(ConfigError::EmptyModelType(id.clone()));
            }
        }
        Ok(())
    }

    /// The model id configured for the given speaker side, if any.
    pub fn model_for_role(&self, role: SpeakerRole) -> Option<&str> {
        self.models
            .iter()
            .find(|(_, spec)| spec.role == Some(role))
            .map(|(id, _)| id.as_str())
    }
}

/// How the two participants are instructed.
///
/// - `ai-ai` – both sides role-play a human expert; identity is enforced by
///   instruction alone, the history is never role-swapped.
/// - `human-aiai` – one side plays the human persona and sees a role-swapped
///   history on its turns; the other side is a plain assistant.
/// - `no-meta-prompting` – both sides receive a fixed minimal instruction.
///   `default` is accepted as an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
pub enum Mode {
    #[serde(rename = "ai-ai")]
    #[value(name = "ai-ai")]
    AiAi,
    #[serde(rename = "human-aiai")]
    #[value(name = "human-aiai")]
    HumanAiAi,
    #[serde(rename = "no-meta-prompting", alias = "default")]
    #[value(name = "no-meta-prompting", alias = "default")]
    #[default]
    NoMetaPrompting,
}

impl Mode {
    /// Short tag used in transcript file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            Mode::AiAi => "aiai",
            Mode::HumanAiAi => "humai",
            Mode::NoMetaPrompting => "defaults",
        }
    }

    /// All modes, in the order the comparison runner drives them.
    pub fn all() -> [Mode; 3] {
        [Mode::AiAi, Mode::HumanAiAi, Mode::NoMetaPrompting]
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::AiAi => write!(f, "ai-ai"),
            Mode::HumanAiAi => write!(f, "human-aiai"),
            Mode::NoMetaPrompting => write!(f, "no-meta-prompting"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai-ai" => Ok(Mode::AiAi),
            "human-aiai" => Ok(Mode::HumanAiAi),
            "no-meta-prompting" | "default" => Ok(Mode::NoMetaPrompting),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Which side of the conversation a configured model plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Human,
    Ai,
}

/// One participating model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier, e.g. `claude-3-7-sonnet`, `gemini-2.0-flash-exp`,
    /// `o1`, `ollama:phi4`, `mlx:qwen2.5`.  The backend is selected from this
    /// id by the client factory; capabilities are a pure function of it.
    #[serde(rename = "type")]
    pub model_type: String,
    /// Which conversation side this model plays.  When absent, the runner
    /// assigns sides by declaration order.
    #[serde(default)]
    pub role: Option<SpeakerRole>,
    /// Reasoning effort forwarded to reasoning-tier backends
    /// (`low` | `medium` | `high`).
    #[serde(default)]
    pub reasoning_level: Option<String>,
    /// Request the backend's extended thinking mode where supported.
    #[serde(default)]
    pub extended_thinking: bool,
    /// Thinking-token budget for extended thinking.
    #[serde(default)]
    pub budget_tokens: Option<u32>,
}

/// What a model endpoint can do, derived from its `type` string alone.
///
/// Detection is deliberately a pure function so config validation and the
/// client factory agree without consulting the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelCapabilities {
    /// Accepts image (and chunked video) attachments.
    pub vision: bool,
    /// Reasoning-tier endpoint: temperature pinned at 1.0, large output cap.
    pub reasoning: bool,
    /// Served from a local endpoint; no API key required.
    pub local: bool,
}

impl ModelCapabilities {
    pub fn for_type(model_type: &str) -> Self {
        let t = model_type.to_ascii_lowercase();
        let local = t.starts_with("ollama:")
            || t.starts_with("pico:")
            || t.starts_with("mlx:")
            || t.starts_with("lmstudio:");
        let reasoning = t.starts_with("o1") || t.starts_with("o3") || t.contains("-r1");
        let vision = !local
            && !reasoning
            && (t.starts_with("gemini") || t.starts_with("claude") || t.starts_with("gpt-4o"));
        Self {
            vision,
            reasoning,
            local,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
