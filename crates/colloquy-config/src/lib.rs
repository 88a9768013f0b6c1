// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Discussion configuration: YAML schema, layered loading, and capability
//! detection for configured model endpoints.

mod loader;
mod schema;

pub use loader::load;
pub use schema::{DiscussionConfig, Mode, ModelCapabilities, ModelSpec, SpeakerRole};

/// Structural configuration problems detected before any network activity.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    MissingKey(&'static str),
    #[error("rounds must be >= 1, got {0}")]
    InvalidRounds(u32),
    #[error("unknown mode: {0:?} (expected ai-ai, human-aiai or no-meta-prompting)")]
    UnknownMode(String),
    #[error("model {0:?} has an empty type")]
    EmptyModelType(String),
}
