// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Conversation orchestration: the turn loop, its mode and role semantics,
//! rate limiting, the retry policy, and the transcript artifacts.

mod arbiter;
mod manager;
mod rate_limit;
mod report;
mod topic;
mod transcript;

pub use arbiter::{persist_verdict, Arbiter, ModeHistories};
pub use manager::{ConversationManager, RunContext, MAX_RETRIES};
pub use rate_limit::{RateLimiter, DEFAULT_MIN_DELAY};
pub use report::{render_fatal_report, write_fatal_report, FatalReport};
pub use topic::extract_core_topic;
pub use transcript::{render_transcript, transcript_file_name, write_transcript};

use colloquy_model::{ClientError, ErrorClass};

/// Failures that end a conversation run.
///
/// Connection trouble never surfaces here directly – the retry driver either
/// recovers or degrades the history; only auth/quota failures and local
/// problems (media, config) abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("fatal {class:?} failure from {model}: {source}")]
    Fatal {
        model: String,
        class: ErrorClass,
        #[source]
        source: ClientError,
    },
    #[error("media ingestion failed: {0}")]
    Media(#[from] colloquy_media::MediaError),
    #[error("configuration error: {0}")]
    Config(#[from] colloquy_config::ConfigError),
    #[error("no models configured for conversation")]
    NoModels,
}
