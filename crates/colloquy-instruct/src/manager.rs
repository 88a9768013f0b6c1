// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adaptive instruction generation: analyze the rolling context, select one
//! of four base templates, then customize it for the mode and role.
//!
//! `generate_instructions` never fails the turn: selection and customization
//! problems degrade to documented fallback instructions instead.

use regex::Regex;
use tracing::{debug, warn};

use colloquy_config::Mode;
use colloquy_model::{Message, Role};

use crate::{
    context::{AnalyzeContext, ContextAnalyzer, ContextVector},
    templates::{
        TemplateRegistry, AI_AI_CONVERSATION_INSTRUCTION, FALLBACK_MINIMAL, HUMAN_PERSONA_BLOCK,
        OUTPUT_FOOTER, PLAIN_FORMAT_INSTRUCTION, ROLE_PERSONA, SPECIAL_HUMAN_INSTRUCTION,
        TOKENS_PER_TURN,
    },
    InstructionError,
};

pub struct AdaptiveInstructionManager {
    registry: TemplateRegistry,
    analyzer: Box<dyn AnalyzeContext>,
}

impl Default for AdaptiveInstructionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveInstructionManager {
    pub fn new() -> Self {
        Self {
            registry: TemplateRegistry::builtin(),
            analyzer: Box::new(ContextAnalyzer),
        }
    }

    /// Replace the template bundle (tests model partial registries this way).
    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the context analyzer with a stub.
    pub fn with_analyzer(mut self, analyzer: Box<dyn AnalyzeContext>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Produce the system instruction for the next turn.
    ///
    /// Pure up to the analyzer: identical `(history, domain, mode, role)`
    /// inputs yield identical output.
    pub fn generate_instructions(
        &self,
        history: &[Message],
        domain: &str,
        mode: Mode,
        role: Role,
    ) -> String {
        debug!(%mode, %role, messages = history.len(), "generating adaptive instructions");

        let context = self.analyzer.analyze(history);

        let template = match self.select_template(&context, mode) {
            Ok((name, text)) => {
                debug!(template = %name, "template selected");
                text.to_string()
            }
            Err(e) => {
                warn!(error = %e, "template selection failed, using minimal fallback");
                return FALLBACK_MINIMAL.to_string();
            }
        };

        match customize_template(&template, &context, domain, mode, role) {
            Ok(instructions) => instructions,
            Err(e) => {
                warn!(error = %e, "template customization failed, using domain fallback");
                format!("You are discussing {domain}. Be helpful and think step by step.")
            }
        }
    }

    /// Deterministic selection over the context metrics, checked in order.
    ///
    /// All four templates for the active prefix must exist; a partial bundle
    /// is a deployment defect and fails with `TemplateNotFound` rather than
    /// silently picking whatever is present.
    pub fn select_template(
        &self,
        context: &ContextVector,
        mode: Mode,
    ) -> Result<(String, &str), InstructionError> {
        let prefix = if mode == Mode::AiAi { "ai-ai-" } else { "" };

        if self.registry.is_empty() {
            return Err(InstructionError::TemplateNotFound(
                "no templates available".into(),
            ));
        }
        for name in TemplateRegistry::required_names(prefix) {
            if !self.registry.contains(&name) {
                return Err(InstructionError::TemplateNotFound(name));
            }
        }

        let name = if context.topic_evolution.len() < 2 {
            // Early in the conversation.
            format!("{prefix}exploratory")
        } else if context.semantic_coherence < 0.5 {
            // Low coherence, re-impose structure.
            format!("{prefix}structured")
        } else if context.cognitive_load > 0.8 {
            // High complexity, consolidate.
            format!("{prefix}synthesis")
        } else if context.knowledge_depth > 0.8 {
            // Deep discussion, stress-test.
            format!("{prefix}critical")
        } else {
            format!("{prefix}exploratory")
        };

        let text = self
            .registry
            .get(&name)
            .ok_or_else(|| InstructionError::TemplateNotFound(name.clone()))?;
        Ok((name, text))
    }
}

/// Substitute `{domain}` / `{tokens}` and reject templates that still carry
/// an unfilled placeholder afterwards.
fn substitute(template: &str, domain: &str, tokens: u32) -> Result<String, InstructionError> {
    let out = template
        .replace("{domain}", domain)
        .replace("{tokens}", &tokens.to_string());
    let placeholder = Regex::new(r"\{[a-z_]+\}").expect("static pattern");
    if let Some(m) = placeholder.find(&out) {
        return Err(InstructionError::TemplateFormat(format!(
            "unfilled placeholder {}",
            m.as_str()
        )));
    }
    Ok(out)
}

/// The customization pipeline for human-persona output.
///
/// Applied when the mode is `ai-ai` or the turn belongs to the user side;
/// the plain-assistant side in `human-aiai` gets the substituted template
/// alone.  The persona block is appended verbatim, then the substituted
/// template again, then context-conditional guidelines, persona sentence,
/// the mode-specific closing instruction, and the output footer.
fn customize_template(
    template: &str,
    context: &ContextVector,
    domain: &str,
    mode: Mode,
    role: Role,
) -> Result<String, InstructionError> {
    let human_side = mode == Mode::AiAi || role == Role::User;
    if !human_side {
        return Ok(substitute(template, domain, TOKENS_PER_TURN)?.trim().to_string());
    }

    let mut instructions = substitute(template, domain, TOKENS_PER_TURN)?
        .trim()
        .to_string();
    instructions.push('\n');
    instructions.push_str(HUMAN_PERSONA_BLOCK);
    instructions.push('\n');
    instructions.push_str(substitute(template, domain, TOKENS_PER_TURN)?.trim());

    let mut modifications: Vec<String> = Vec::new();
    let metric = |map: &std::collections::HashMap<String, f64>, key: &str, default: f64| {
        map.get(key).copied().unwrap_or(default)
    };

    if metric(&context.uncertainty_markers, "uncertainty", 0.0) > 0.6 {
        modifications.push("Request specific clarification on unclear points".into());
    }
    if metric(&context.reasoning_patterns, "deductive", 0.0) < 0.3 {
        modifications.push("Encourage logical reasoning and clear arguments".into());
    }
    if mode == Mode::AiAi {
        if metric(&context.reasoning_patterns, "formal_logic", 0.0) < 0.3 {
            modifications.push("Use more formal logical structures in responses".into());
        }
        if metric(&context.reasoning_patterns, "technical", 0.0) < 0.4 {
            modifications.push("Increase use of precise technical terminology".into());
        }
    }
    if metric(&context.engagement_metrics, "turn_taking_balance", 1.0) < 0.4 {
        modifications.push("Ask more follow-up questions to maintain engagement".into());
    }
    if domain.to_lowercase().contains("goal") {
        modifications.push(format!("** Focus on achieving the specified goal! {domain} **"));
    }

    if !modifications.is_empty() {
        instructions.push_str("\n\nAdditional Guidelines:\n- ");
        instructions.push_str(&modifications.join("\n- "));
    }

    instructions.push_str(ROLE_PERSONA);

    if role == Role::User && mode != Mode::NoMetaPrompting {
        let special = match mode {
            Mode::HumanAiAi => SPECIAL_HUMAN_INSTRUCTION,
            Mode::AiAi => AI_AI_CONVERSATION_INSTRUCTION,
            Mode::NoMetaPrompting => PLAIN_FORMAT_INSTRUCTION,
        };
        instructions.push('\n');
        instructions.push_str(special);
    }

    instructions.push_str(&substitute(OUTPUT_FOOTER, domain, TOKENS_PER_TURN)?);

    Ok(instructions.trim().to_string())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Analyzer stub returning a fixed vector regardless of input.
    struct StubAnalyzer(ContextVector);

    impl AnalyzeContext for StubAnalyzer {
        fn analyze(&self, _history: &[Message]) -> ContextVector {
            self.0.clone()
        }
    }

    fn stubbed(vector: ContextVector) -> AdaptiveInstructionManager {
        AdaptiveInstructionManager::new().with_analyzer(Box::new(StubAnalyzer(vector)))
    }

    fn topics(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("topic-{i}")).collect()
    }

    // ── Template selection ────────────────────────────────────────────────────

    #[test]
    fn short_topic_evolution_selects_exploratory() {
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(1),
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::HumanAiAi).unwrap();
        assert_eq!(name, "exploratory");
    }

    #[test]
    fn ai_ai_mode_selects_prefixed_templates() {
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(1),
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::AiAi).unwrap();
        assert_eq!(name, "ai-ai-exploratory");
    }

    #[test]
    fn low_coherence_selects_structured() {
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(5),
            semantic_coherence: 0.2,
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::HumanAiAi).unwrap();
        assert_eq!(name, "structured");
    }

    #[test]
    fn high_cognitive_load_selects_synthesis() {
        // Scenario: load 0.9, depth 0.5, five topics.
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(5),
            semantic_coherence: 0.9,
            cognitive_load: 0.9,
            knowledge_depth: 0.5,
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::HumanAiAi).unwrap();
        assert_eq!(name, "synthesis");
        let (name, _) = m.select_template(&ctx, Mode::AiAi).unwrap();
        assert_eq!(name, "ai-ai-synthesis");
    }

    #[test]
    fn high_knowledge_depth_selects_critical() {
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(5),
            semantic_coherence: 0.9,
            cognitive_load: 0.5,
            knowledge_depth: 0.9,
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::HumanAiAi).unwrap();
        assert_eq!(name, "critical");
    }

    #[test]
    fn defaults_select_exploratory() {
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(5),
            semantic_coherence: 0.7,
            cognitive_load: 0.5,
            knowledge_depth: 0.5,
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::HumanAiAi).unwrap();
        assert_eq!(name, "exploratory");
    }

    #[test]
    fn selection_order_checks_coherence_before_load() {
        // Both low coherence and high load: coherence wins by check order.
        let m = AdaptiveInstructionManager::new();
        let ctx = ContextVector {
            topic_evolution: topics(4),
            semantic_coherence: 0.1,
            cognitive_load: 0.95,
            ..Default::default()
        };
        let (name, _) = m.select_template(&ctx, Mode::HumanAiAi).unwrap();
        assert_eq!(name, "structured");
    }

    #[test]
    fn partial_registry_fails_selection() {
        let m = AdaptiveInstructionManager::new()
            .with_registry(TemplateRegistry::from_entries([("exploratory", "x {domain}")]));
        let err = m
            .select_template(&ContextVector::default(), Mode::HumanAiAi)
            .unwrap_err();
        assert!(matches!(err, InstructionError::TemplateNotFound(_)));
    }

    // ── generate_instructions scenarios ───────────────────────────────────────

    #[test]
    fn goal_history_produces_exploratory_human_instructions() {
        // History = [{system, "GOAL: write story"}], mode ai-ai, role user.
        let m = AdaptiveInstructionManager::new();
        let history = vec![Message::system("GOAL: write story")];
        let out = m.generate_instructions(&history, "GOAL: write story", Mode::AiAi, Role::User);
        assert!(out.contains("NEVER REFER TO YOURSELF AS AN AI"));
        assert!(out.contains("write story"));
        // Goal-focus guideline fires because the domain mentions a goal.
        assert!(out.contains("** Focus on achieving the specified goal! GOAL: write story **"));
    }

    #[test]
    fn drifting_history_selects_structured_through_the_analyzer() {
        // Six messages whose topics share no pairwise similarity drive
        // coherence below 0.5, so selection lands on the structured template.
        let m = AdaptiveInstructionManager::new();
        let history = vec![
            Message::user("quantum quantum effects"),
            Message::assistant("gardening gardening tips"),
            Message::user("volcano volcano geology"),
            Message::assistant("espresso espresso brewing"),
            Message::user("handball handball rules"),
            Message::assistant("origami origami folds"),
        ];
        let context = crate::ContextAnalyzer.analyze(&history);
        let (name, _) = m.select_template(&context, Mode::AiAi).unwrap();
        assert_eq!(name, "ai-ai-structured");
    }

    #[test]
    fn missing_templates_fall_back_to_minimal_instruction() {
        let m = AdaptiveInstructionManager::new()
            .with_registry(TemplateRegistry::from_entries([("exploratory", "x {domain}")]));
        let out = m.generate_instructions(&[], "anything", Mode::HumanAiAi, Role::User);
        assert!(out.starts_with("You are a helpful assistant."));
        assert_eq!(out, FALLBACK_MINIMAL);
    }

    #[test]
    fn empty_registry_falls_back_to_minimal_instruction() {
        let m = AdaptiveInstructionManager::new().with_registry(TemplateRegistry::empty());
        let out = m.generate_instructions(&[], "anything", Mode::AiAi, Role::User);
        assert_eq!(out, FALLBACK_MINIMAL);
    }

    #[test]
    fn customization_failure_falls_back_to_domain_instruction() {
        // A template with a placeholder we cannot fill fails substitution.
        let reg = TemplateRegistry::from_entries([
            ("exploratory", "needs {widget} in {domain}"),
            ("structured", "s {domain}"),
            ("synthesis", "y {domain}"),
            ("critical", "c {domain}"),
        ]);
        let m = AdaptiveInstructionManager::new().with_registry(reg);
        let out = m.generate_instructions(&[], "rust", Mode::HumanAiAi, Role::User);
        assert_eq!(
            out,
            "You are discussing rust. Be helpful and think step by step."
        );
    }

    #[test]
    fn assistant_side_in_human_aiai_gets_plain_template() {
        let m = AdaptiveInstructionManager::new();
        let out = m.generate_instructions(&[], "compilers", Mode::HumanAiAi, Role::Assistant);
        assert!(out.contains("compilers"));
        assert!(!out.contains("NEVER REFER TO YOURSELF AS AN AI"));
        assert!(!out.contains("**Output**"));
    }

    #[test]
    fn human_side_in_human_aiai_gets_guidance_instruction() {
        let m = AdaptiveInstructionManager::new();
        let out = m.generate_instructions(&[], "compilers", Mode::HumanAiAi, Role::User);
        assert!(out.contains(SPECIAL_HUMAN_INSTRUCTION));
        assert!(!out.contains(AI_AI_CONVERSATION_INSTRUCTION));
    }

    #[test]
    fn ai_ai_user_turn_gets_conversation_instruction() {
        let m = AdaptiveInstructionManager::new();
        let out = m.generate_instructions(&[], "compilers", Mode::AiAi, Role::User);
        assert!(out.contains(AI_AI_CONVERSATION_INSTRUCTION));
        assert!(!out.contains(SPECIAL_HUMAN_INSTRUCTION));
    }

    #[test]
    fn customized_output_carries_token_budget_footer() {
        let m = AdaptiveInstructionManager::new();
        let out = m.generate_instructions(&[], "compilers", Mode::AiAi, Role::User);
        assert!(out.contains("Restrict your responses to 1024 tokens per turn"));
    }

    #[test]
    fn stub_analyzer_drives_selection() {
        // A stub with cognitive_load 0.9 must land on synthesis regardless of
        // actual history content.
        let ctx = ContextVector {
            topic_evolution: topics(5),
            semantic_coherence: 0.9,
            cognitive_load: 0.9,
            knowledge_depth: 0.5,
            ..Default::default()
        };
        let m = stubbed(ctx);
        let out = m.generate_instructions(&[], "physics", Mode::HumanAiAi, Role::Assistant);
        // The synthesis template text shows through on the plain path.
        assert!(out.contains("Consolidate before extending"));
    }

    #[test]
    fn low_balance_adds_follow_up_guideline() {
        let mut engagement = std::collections::HashMap::new();
        engagement.insert("turn_taking_balance".to_string(), 0.1);
        let ctx = ContextVector {
            topic_evolution: topics(1),
            engagement_metrics: engagement,
            ..Default::default()
        };
        let m = stubbed(ctx);
        let out = m.generate_instructions(&[], "physics", Mode::AiAi, Role::User);
        assert!(out.contains("Ask more follow-up questions to maintain engagement"));
    }

    #[test]
    fn missing_balance_metric_defaults_to_balanced() {
        // No engagement metrics at all: the guideline must not fire.
        let ctx = ContextVector {
            topic_evolution: topics(1),
            ..Default::default()
        };
        let m = stubbed(ctx);
        let out = m.generate_instructions(&[], "physics", Mode::AiAi, Role::User);
        assert!(!out.contains("Ask more follow-up questions"));
    }

    #[test]
    fn generate_is_pure_for_identical_inputs() {
        let m = AdaptiveInstructionManager::new();
        let history = vec![
            Message::system("Topic: safety"),
            Message::user("first question about safety margins"),
            Message::assistant("a considered answer, with caveats"),
        ];
        let a = m.generate_instructions(&history, "safety", Mode::AiAi, Role::User);
        let b = m.generate_instructions(&history, "safety", Mode::AiAi, Role::User);
        assert_eq!(a, b);
    }

    // ── Substitution ──────────────────────────────────────────────────────────

    #[test]
    fn substitute_fills_domain_and_tokens() {
        let out = substitute("on {domain} in {tokens} tokens", "x", 7).unwrap();
        assert_eq!(out, "on x in 7 tokens");
    }

    #[test]
    fn substitute_rejects_unknown_placeholders() {
        let err = substitute("needs {widget}", "x", 7).unwrap_err();
        assert!(matches!(err, InstructionError::TemplateFormat(_)));
    }
}
