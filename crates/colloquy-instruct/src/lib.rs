// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adaptive Instruction Manager: per-turn system prompts synthesised from
//! rolling conversation state.

mod context;
mod manager;
mod templates;

pub use context::{
    similarity, AnalyzeContext, ContextAnalyzer, ContextVector, ANALYSIS_WINDOW,
    SIMILARITY_THRESHOLD,
};
pub use manager::AdaptiveInstructionManager;
pub use templates::{TemplateRegistry, FALLBACK_MINIMAL, TOKENS_PER_TURN};

/// Failures inside instruction generation.
///
/// None of these fail a turn: `generate_instructions` degrades to a fallback
/// instruction instead, so the taxonomy mostly matters to logs and tests.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InstructionError {
    #[error("invalid input: {0}")]
    InputValidation(String),
    #[error("required template not found: {0}")]
    TemplateNotFound(String),
    #[error("template formatting failed: {0}")]
    TemplateFormat(String),
    #[error("template customization failed: {0}")]
    TemplateCustomization(String),
    #[error("context analysis failed: {0}")]
    ContextAnalysis(String),
}
