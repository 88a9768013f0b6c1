// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Transcript artifact: the finished history rendered into a standalone HTML
//! file for human review and downstream arbitration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::info;

use colloquy_config::Mode;
use colloquy_model::{Message, Role};

/// Replace every non-word character with `_` (file-name safety).
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// `conv-{modeTag}_{promptPrefix}_{humanModel}_{aiModel}_{MMDDhhmm}.html`
pub fn transcript_file_name(
    mode: Mode,
    initial_prompt: &str,
    human_model: &str,
    ai_model: &str,
    timestamp: &DateTime<Local>,
) -> String {
    let prefix: String = sanitize(&initial_prompt.chars().take(50).collect::<String>());
    format!(
        "conv-{}_{}_{}_{}_{}.html",
        mode.file_tag(),
        prefix,
        sanitize(human_model),
        sanitize(ai_model),
        timestamp.format("%m%d%H%M"),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn message_div(message: &Message) -> String {
    let (class, label) = match message.role {
        Role::System => ("system-message", "System"),
        Role::User => ("human-message", "Human"),
        Role::Assistant => ("ai-message", "AI"),
    };
    // Conversational turns are instructed to produce HTML fragments and are
    // embedded as-is; system text is plain and gets escaped.
    let body = match message.role {
        Role::System => escape(&message.content),
        _ => message.content.clone(),
    };
    let mut div = format!("<div class=\"{class}\"><strong>{label}:</strong> {body}</div>\n");
    if let Some(att) = &message.attachment {
        div.push_str(&format!(
            "<div class=\"file-content\"><pre>{}</pre></div>\n",
            escape(&att.as_text_block())
        ));
    }
    div
}

/// Render the full transcript document.
pub fn render_transcript(history: &[Message], mode: Mode, title: &str) -> String {
    let mut body = String::new();
    for message in history {
        body.push_str(&message_div(message));
    }
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 60em; margin: 2em auto; }}
.system-message {{ background: #f0f0f0; padding: 0.8em; margin: 0.6em 0; border-left: 4px solid #888; }}
.human-message {{ background: #eef6ff; padding: 0.8em; margin: 0.6em 0; border-left: 4px solid #3478c0; }}
.ai-message {{ background: #f2fff0; padding: 0.8em; margin: 0.6em 0; border-left: 4px solid #4a9a44; }}
.file-content {{ background: #fffbe8; padding: 0.8em; margin: 0.6em 0 0.6em 2em; border-left: 4px solid #c0a034; overflow-x: auto; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>mode: {mode}</p>
{body}</body>
</html>
"#,
        title = escape(title),
        mode = mode,
        body = body,
    )
}

/// Write the transcript into `dir` and return the artifact path.
pub fn write_transcript(
    dir: &Path,
    history: &[Message],
    mode: Mode,
    initial_prompt: &str,
    human_model: &str,
    ai_model: &str,
) -> anyhow::Result<PathBuf> {
    let name = transcript_file_name(mode, initial_prompt, human_model, ai_model, &Local::now());
    let path = dir.join(name);
    let html = render_transcript(history, mode, initial_prompt);
    std::fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "transcript saved");
    Ok(path)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
