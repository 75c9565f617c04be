//! Provider-neutral request types for completion calls.

use serde::{Deserialize, Serialize};

/// Author of a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One piece of message content: plain text or an attached PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    File {
        filename: String,
        /// Base64 payload. A leading `data:...;base64,` prefix is tolerated.
        data: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn pdf(filename: impl Into<String>, data: impl Into<String>) -> Self {
        Self::File {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Strip an optional `data:<mime>;base64,` prefix from a base64 payload.
pub fn bare_base64(data: &str) -> &str {
    if data.starts_with("data:") {
        data.split_once(',').map_or(data, |(_, rest)| rest)
    } else {
        data
    }
}

/// A single message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: parts,
        }
    }

    /// All text parts joined with blank lines; file parts are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::File { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn has_file(&self) -> bool {
        self.content
            .iter()
            .any(|p| matches!(p, ContentPart::File { .. }))
    }
}

/// A completion request: an ordered message list plus the JSON-mode flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    /// Ask the provider to constrain output to a JSON object.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn json(messages: Vec<Message>) -> Self {
        Self {
            messages,
            json_mode: true,
        }
    }

    /// Total characters of text content, for logging.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.text().len()).sum()
    }
}
