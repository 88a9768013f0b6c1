// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Downstream handoff: the three finished histories plus the goal are passed
//! to an evaluator the engine knows nothing about.
//!
//! The verdict is an opaque JSON value; the engine persists it verbatim and
//! never depends on its shape.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use colloquy_model::Message;

/// The three transcripts produced by a comparison run, one per mode.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModeHistories {
    pub ai_ai: Vec<Message>,
    pub human_aiai: Vec<Message>,
    pub no_meta_prompting: Vec<Message>,
}

/// Comparative evaluator over finished transcripts.
///
/// Implementations may score however they like (another model call, string
/// metrics, a human rubric); the engine only persists whatever comes back.
#[async_trait]
pub trait Arbiter: Send + Sync {
    async fn evaluate(
        &self,
        goal: &str,
        histories: &ModeHistories,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Write an arbiter verdict to `dir` as pretty-printed JSON.
pub fn persist_verdict(dir: &Path, verdict: &serde_json::Value) -> anyhow::Result<PathBuf> {
    let path = dir.join("arbiter_verdict.json");
    let text = serde_json::to_string_pretty(verdict).context("serialising arbiter verdict")?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingArbiter;

    #[async_trait]
    impl Arbiter for CountingArbiter {
        async fn evaluate(
            &self,
            goal: &str,
            histories: &ModeHistories,
        ) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({
                "goal": goal,
                "ai_ai_messages": histories.ai_ai.len(),
                "human_aiai_messages": histories.human_aiai.len(),
                "no_meta_messages": histories.no_meta_prompting.len(),
            }))
        }
    }

    #[tokio::test]
    async fn engine_treats_verdict_as_opaque() {
        let histories = ModeHistories {
            ai_ai: vec![Message::system("t"), Message::user("a")],
            human_aiai: vec![Message::system("t")],
            no_meta_prompting: vec![],
        };
        let verdict = CountingArbiter
            .evaluate("the goal", &histories)
            .await
            .unwrap();
        assert_eq!(verdict["ai_ai_messages"], 2);
        assert_eq!(verdict["goal"], "the goal");
    }

    #[tokio::test]
    async fn verdict_is_persisted_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = serde_json::json!({ "winner": "human-aiai", "score": 0.7 });
        let path = persist_verdict(dir.path(), &verdict).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, verdict);
    }
}
