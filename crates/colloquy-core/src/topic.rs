//! Core-topic extraction from the initial prompt.
//!
//! The extracted topic becomes message 0 of every conversation and the
//! `domain` string the instruction manager substitutes into templates.

use regex::Regex;

/// Extract the core topic from an initial prompt.
///
/// First match wins:
/// 1. `Topic:` marker → `"Discuss: "` + the rest of that line.
/// 2. `GOAL:` marker → the rest of that line, preferring the first
///    parenthesized group when one is present, prefixed with `"GOAL: "`.
/// 3. Otherwise the trimmed prompt itself.
///
/// The function is total – malformed markers degrade to the trimmed prompt –
/// and idempotent on its own `Discuss:`/`GOAL:` outputs.
pub fn extract_core_topic(initial_prompt: &str) -> String {
    let trimmed = initial_prompt.trim();

    if let Some(idx) = trimmed.find("Topic:") {
        let after = &trimmed[idx + "Topic:".len()..];
        let line = after.lines().next().unwrap_or("").trim();
        if !line.is_empty() {
            return format!("Discuss: {line}");
        }
        return trimmed.to_string();
    }

    if let Some(idx) = trimmed.find("GOAL:") {
        let after = &trimmed[idx + "GOAL:".len()..];
        let line = after.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return trimmed.to_string();
        }
        let group = Regex::new(r"\(([^)]*)\)")
            .expect("static pattern")
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        let topic = match group {
            Some(g) if !g.is_empty() => g,
            _ => line.to_string(),
        };
        return format!("GOAL: {topic}");
    }

    trimmed.to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
