// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Rolling-context analysis: the numeric summary of conversation state that
//! drives template selection and customization.
//!
//! The heuristics are deliberately cheap and fully deterministic – the
//! downstream contract is only that every scalar and map value lands in
//! [0, 1].  A stub implementation of [`AnalyzeContext`] can replace the
//! analyzer wherever tests need fixed metrics.

use std::collections::HashMap;

use colloquy_model::{Message, Role};

/// Messages considered per analysis pass (the tail of the history).
pub const ANALYSIS_WINDOW: usize = 10;

/// Topic-transition similarity threshold for the coherence metric.
pub const SIMILARITY_THRESHOLD: f64 = 0.3;

/// How many preceding topics a transition is matched against.
const COHERENCE_LOOKBACK: usize = 3;

/// Numeric summary of the rolling conversation state.
///
/// Scalars default to 0.5 when there is not enough data to measure; maps
/// default to empty rather than null.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextVector {
    pub topic_evolution: Vec<String>,
    pub semantic_coherence: f64,
    pub cognitive_load: f64,
    pub knowledge_depth: f64,
    pub uncertainty_markers: HashMap<String, f64>,
    pub reasoning_patterns: HashMap<String, f64>,
    pub engagement_metrics: HashMap<String, f64>,
}

impl Default for ContextVector {
    fn default() -> Self {
        Self {
            topic_evolution: Vec::new(),
            semantic_coherence: 0.5,
            cognitive_load: 0.5,
            knowledge_depth: 0.5,
            uncertainty_markers: HashMap::new(),
            reasoning_patterns: HashMap::new(),
            engagement_metrics: HashMap::new(),
        }
    }
}

impl ContextVector {
    /// True when every scalar and every map value is inside [0, 1].
    pub fn in_bounds(&self) -> bool {
        let scalar_ok = |v: f64| (0.0..=1.0).contains(&v);
        scalar_ok(self.semantic_coherence)
            && scalar_ok(self.cognitive_load)
            && scalar_ok(self.knowledge_depth)
            && self
                .uncertainty_markers
                .values()
                .chain(self.reasoning_patterns.values())
                .chain(self.engagement_metrics.values())
                .all(|&v| scalar_ok(v))
    }
}

/// Seam for context analysis so the manager can run against a stub.
pub trait AnalyzeContext: Send + Sync {
    fn analyze(&self, history: &[Message]) -> ContextVector;
}

/// Heuristic analyzer over the last [`ANALYSIS_WINDOW`] messages.
#[derive(Debug, Default, Clone)]
pub struct ContextAnalyzer;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "because", "been", "before", "being", "below",
    "between", "both", "cannot", "could", "does", "doing", "down", "during", "each", "from",
    "further", "have", "having", "here", "into", "itself", "just", "more", "most", "other", "over",
    "same", "should", "some", "such", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "under", "until", "very", "were", "what", "when", "where",
    "which", "while", "will", "with", "would", "your",
];

const UNCERTAINTY_MARKERS: &[&str] = &[
    "maybe", "perhaps", "possibly", "not sure", "unclear", "might", "uncertain", "i think",
    "i guess", "hard to say",
];

const DEDUCTIVE_MARKERS: &[&str] = &[
    "therefore", "thus", "hence", "because", "it follows", "consequently", "so we can conclude",
];

const FORMAL_LOGIC_MARKERS: &[&str] = &[
    "implies", "if and only if", "premise", "conclusion", "axiom", "contradiction", "necessarily",
    "for all", "there exists",
];

const ANALOGICAL_MARKERS: &[&str] = &["similar to", "analogous", "like a", "as if", "imagine"];

impl AnalyzeContext for ContextAnalyzer {
    fn analyze(&self, history: &[Message]) -> ContextVector {
        let window = &history[history.len().saturating_sub(ANALYSIS_WINDOW)..];
        let mut vector = ContextVector::default();
        if window.is_empty() {
            return vector;
        }

        for message in window {
            if let Some(topic) = extract_topic(&message.content) {
                vector.topic_evolution.push(topic);
            }
        }
        vector.semantic_coherence = coherence(&vector.topic_evolution);

        // Conversational turns only; the pinned system topic would skew the
        // linguistic metrics.
        let spoken: Vec<&str> = window
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if spoken.is_empty() {
            return vector;
        }

        vector.cognitive_load = cognitive_load(&spoken);
        vector.knowledge_depth = knowledge_depth(&spoken);

        vector
            .uncertainty_markers
            .insert("uncertainty".into(), marker_rate(&spoken, UNCERTAINTY_MARKERS));
        vector
            .uncertainty_markers
            .insert("clarification".into(), question_rate(&spoken));

        vector
            .reasoning_patterns
            .insert("deductive".into(), marker_rate(&spoken, DEDUCTIVE_MARKERS));
        vector
            .reasoning_patterns
            .insert("formal_logic".into(), marker_rate(&spoken, FORMAL_LOGIC_MARKERS));
        vector
            .reasoning_patterns
            .insert("technical".into(), technical_density(&spoken));
        vector
            .reasoning_patterns
            .insert("analogical".into(), marker_rate(&spoken, ANALOGICAL_MARKERS));

        vector
            .engagement_metrics
            .insert("turn_taking_balance".into(), turn_balance(window));
        vector
            .engagement_metrics
            .insert("question_rate".into(), question_rate(&spoken));

        debug_assert!(vector.in_bounds());
        vector
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .filter(|w| !w.is_empty())
}

/// Most frequent non-stopword token of at least four characters; ties break
/// toward the earliest occurrence so analysis stays deterministic.
fn extract_topic(text: &str) -> Option<String> {
    let tokens: Vec<String> = words(text)
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| w.len() >= 4 && !STOPWORDS.contains(&w.as_str()))
        .collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in &tokens {
        *counts.entry(t.as_str()).or_default() += 1;
    }
    // Strictly-greater comparison: the earliest occurrence wins ties, which
    // keeps extraction deterministic across runs.
    let mut best: Option<(&str, usize)> = None;
    for t in &tokens {
        let count = counts[t.as_str()];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((t.as_str(), count));
        }
    }
    best.map(|(t, _)| t.to_string())
}

/// Character-bigram Jaccard similarity between two topic tokens.
pub fn similarity(a: &str, b: &str) -> f64 {
    let bigrams = |s: &str| -> std::collections::HashSet<(char, char)> {
        let chars: Vec<char> = s.to_ascii_lowercase().chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let (sa, sb) = (bigrams(a), bigrams(b));
    if sa.is_empty() || sb.is_empty() {
        return if a.eq_ignore_ascii_case(b) { 1.0 } else { 0.0 };
    }
    let intersection = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    intersection / union
}

/// 1 − (unmatched transitions / transitions), matching each topic against the
/// last [`COHERENCE_LOOKBACK`] topics before it.
fn coherence(topics: &[String]) -> f64 {
    if topics.len() < 2 {
        return 0.5;
    }
    let mut unmatched = 0usize;
    let transitions = topics.len() - 1;
    for i in 1..topics.len() {
        let start = i.saturating_sub(COHERENCE_LOOKBACK);
        let matched = topics[start..i]
            .iter()
            .any(|prev| similarity(&topics[i], prev) >= SIMILARITY_THRESHOLD);
        if !matched {
            unmatched += 1;
        }
    }
    clamp01(1.0 - unmatched as f64 / transitions as f64)
}

/// Sentence length and clause density as a complexity proxy.
fn cognitive_load(messages: &[&str]) -> f64 {
    let mut sentences = 0usize;
    let mut word_total = 0usize;
    let mut commas = 0usize;
    for m in messages {
        sentences += m
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count();
        word_total += words(m).count();
        commas += m.matches(',').count();
    }
    if sentences == 0 {
        return 0.5;
    }
    let avg_sentence = word_total as f64 / sentences as f64;
    let clause_density = commas as f64 / sentences as f64;
    clamp01(0.5 * (avg_sentence / 25.0) + 0.5 * (clause_density / 3.0))
}

/// Long-word density as a proxy for depth of treatment.
fn knowledge_depth(messages: &[&str]) -> f64 {
    let mut total = 0usize;
    let mut long = 0usize;
    for m in messages {
        for w in words(m) {
            total += 1;
            if w.len() >= 8 {
                long += 1;
            }
        }
    }
    if total == 0 {
        return 0.5;
    }
    clamp01(long as f64 / total as f64 * 4.0)
}

/// Marker occurrences per message, clamped.
fn marker_rate(messages: &[&str], markers: &[&str]) -> f64 {
    let mut hits = 0usize;
    for m in messages {
        let lower = m.to_ascii_lowercase();
        hits += markers.iter().filter(|k| lower.contains(*k)).count();
    }
    clamp01(hits as f64 / messages.len() as f64)
}

/// Fraction of tokens that look like identifiers, numbers or jargon.
fn technical_density(messages: &[&str]) -> f64 {
    let mut total = 0usize;
    let mut technical = 0usize;
    for m in messages {
        for w in words(m) {
            total += 1;
            if w.len() >= 10 || w.contains('_') || w.chars().any(|c| c.is_ascii_digit()) {
                technical += 1;
            }
        }
    }
    if total == 0 {
        return 0.5;
    }
    clamp01(technical as f64 / total as f64 * 3.0)
}

/// min/max ratio of user vs assistant turns in the window.
fn turn_balance(window: &[Message]) -> f64 {
    let user = window.iter().filter(|m| m.role == Role::User).count();
    let assistant = window.iter().filter(|m| m.role == Role::Assistant).count();
    match (user.min(assistant), user.max(assistant)) {
        (_, 0) => 0.5,
        (lo, hi) => clamp01(lo as f64 / hi as f64),
    }
}

fn question_rate(messages: &[&str]) -> f64 {
    let questions = messages.iter().filter(|m| m.contains('?')).count();
    clamp01(questions as f64 / messages.len() as f64)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
