use serde::{Deserialize, Serialize};

// ─── Roles ────────────────────────────────────────────────────────────────────

/// Author of a message in the neutral history.
///
/// `human` is accepted on input as an alias of `user` – normalization happens
/// at every serde boundary, while "which side plays the human persona" stays
/// an instruction-level concept that never leaks into role tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "human")]
    #[default]
    User,
    Assistant,
}

impl Role {
    /// The counterpart role: `user` ↔ `assistant`, `system` unchanged.
    /// This is the primitive behind the human-aiai role swap.
    pub fn swapped(self) -> Role {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
            Role::System => Role::System,
        }
    }

    /// Wire-format tag (`system` / `user` / `assistant`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a loose role tag, normalising `human` to `user`.
    /// Returns `None` for tags outside the neutral set so callers can drop
    /// unknown-role messages at translation time.
    pub fn parse_loose(tag: &str) -> Option<Role> {
        match tag.to_ascii_lowercase().as_str() {
            "system" => Some(Role::System),
            "user" | "human" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Attachments ──────────────────────────────────────────────────────────────

/// Normalised file attachment carried by the first human turn.
///
/// Variants enforce the per-kind invariants structurally: an image always has
/// its base64 payload, text and code always carry their content, and a video
/// is always chunked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    Image {
        mime: String,
        path: String,
        base64: String,
        width: u32,
        height: u32,
    },
    Text {
        mime: String,
        path: String,
        content: String,
    },
    Code {
        mime: String,
        path: String,
        content: String,
        language: String,
    },
    Video {
        mime: String,
        path: String,
        /// Base64-encoded 1 MiB chunks of the raw file.
        chunks: Vec<String>,
        chunk_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fps: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resolution: Option<(u32, u32)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_secs: Option<f32>,
    },
}

impl Attachment {
    pub fn kind(&self) -> &'static str {
        match self {
            Attachment::Image { .. } => "image",
            Attachment::Text { .. } => "text",
            Attachment::Code { .. } => "code",
            Attachment::Video { .. } => "video",
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            Attachment::Image { mime, .. }
            | Attachment::Text { mime, .. }
            | Attachment::Code { mime, .. }
            | Attachment::Video { mime, .. } => mime,
        }
    }

    /// Plain-text rendering for backends without native media support:
    /// the textual content itself, or a short descriptor for binary kinds.
    pub fn as_text_block(&self) -> String {
        match self {
            Attachment::Text { content, path, .. } => {
                format!("[file: {path}]\n{content}")
            }
            Attachment::Code { content, path, language, .. } => {
                format!("[code file: {path} ({language})]\n{content}")
            }
            Attachment::Image { path, width, height, .. } => {
                format!("[image attached: {path}, {width}x{height}]")
            }
            Attachment::Video { path, chunk_count, .. } => {
                format!("[video attached: {path}, {chunk_count} chunk(s)]")
            }
        }
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), attachment: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), attachment: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), attachment: None }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Copy of this message with `user` ↔ `assistant` exchanged.
    pub fn role_swapped(&self) -> Message {
        Message {
            role: self.role.swapped(),
            content: self.content.clone(),
            attachment: self.attachment.clone(),
        }
    }
}

/// Produce the role-swapped copy of a history: every `assistant` becomes
/// `user` and vice versa, `system` passes through.  No message is dropped,
/// duplicated or reordered.
pub fn swap_history_roles(history: &[Message]) -> Vec<Message> {
    history.iter().map(Message::role_swapped).collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
