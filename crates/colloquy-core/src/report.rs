// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Fatal-error artifact: a standalone HTML report written when a conversation
//! cannot be completed.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use tracing::error;

use colloquy_config::Mode;
use colloquy_model::Role;

/// Everything the operator needs to diagnose an aborted run.
#[derive(Debug, Clone)]
pub struct FatalReport {
    pub message: String,
    pub model: String,
    pub role: Role,
    pub mode: Mode,
    pub domain: String,
    pub message_count: usize,
    /// Chain of error causes, outermost first.
    pub details: Vec<String>,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render the report document.
pub fn render_fatal_report(report: &FatalReport, timestamp: &str) -> String {
    let details = if report.details.is_empty() {
        "<li>(no further detail)</li>".to_string()
    } else {
        report
            .details
            .iter()
            .map(|d| format!("<li><code>{}</code></li>", escape(d)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Fatal error</title></head>
<body>
<h1>Fatal error</h1>
<h2>Error summary</h2>
<ul>
<li>Message: {message}</li>
<li>Time: {timestamp}</li>
<li>Model: {model}</li>
<li>Role: {role}</li>
</ul>
<h2>Session info</h2>
<ul>
<li>Mode: {mode}</li>
<li>Domain: {domain}</li>
<li>Messages exchanged: {count}</li>
</ul>
<h2>Error details</h2>
<ol>
{details}
</ol>
<h2>Recovery options</h2>
<ul>
<li>Check that the backend API key environment variable is set and valid.</li>
<li>Check account quota and billing status for the failing backend.</li>
<li>Check network connectivity to the backend endpoint.</li>
<li>Re-run the conversation; transient connection failures often clear.</li>
<li>Reduce rounds or switch the failing side to a local model.</li>
</ul>
</body>
</html>
"#,
        message = escape(&report.message),
        timestamp = timestamp,
        model = escape(&report.model),
        role = report.role,
        mode = report.mode,
        domain = escape(&report.domain),
        count = report.message_count,
        details = details,
    )
}

/// Write `fatal_error_{YYYYMMDD-HHMMSS}.html` into `dir`.
pub fn write_fatal_report(dir: &Path, report: &FatalReport) -> anyhow::Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let path = dir.join(format!("fatal_error_{timestamp}.html"));
    let html = render_fatal_report(report, &timestamp);
    std::fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
    error!(path = %path.display(), message = %report.message, "fatal error report written");
    Ok(path)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
