use serde::{Deserialize, Serialize};

/// Author of one conversation history entry, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One conversation history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Request payload for the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            prompt: prompt.into(),
            history,
        }
    }
}

/// Request payload for the synchronous grammar-correction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixGrammarRequest {
    pub content: String,
}

/// Response payload for the grammar-correction endpoint; exactly one of the
/// fields is expected to be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixGrammarResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Backend liveness as reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Online,
    Offline,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthReport {
    pub status: String,
}
