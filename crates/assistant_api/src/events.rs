use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Side channel an affect value arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectKind {
    Mood,
    Thought,
}

/// Stream event classified from one decoded generation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatStreamEvent {
    #[serde(rename = "chunk")]
    Chunk { text: String },
    /// Mood/thought side signal; interleaves with chunks, never part of
    /// message content.
    #[serde(rename = "affect")]
    Affect { kind: AffectKind, value: String },
    #[serde(rename = "done")]
    Done,
    /// Server-acknowledged external stop; a non-error terminal.
    #[serde(rename = "stop")]
    Stopped,
    #[serde(rename = "error")]
    Error { message: String },
}

impl ChatStreamEvent {
    /// True when this event terminates the exchange.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Error { .. })
    }
}

/// How a generation exchange ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Completed,
    /// Ended via a server-acknowledged stop record.
    Stopped,
}

/// Classify one decoded record from the generation stream.
///
/// Unknown record kinds are ignored. A `done` record carrying a final
/// `mood` field (older backend revision) yields the mood affect first, so
/// both wire revisions project into the same event sequence.
pub fn classify_chat_record(value: &Value) -> Vec<ChatStreamEvent> {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Vec::new();
    };

    match kind {
        "chunk" => vec![ChatStreamEvent::Chunk {
            text: content_text(value),
        }],
        "mood" => vec![ChatStreamEvent::Affect {
            kind: AffectKind::Mood,
            value: content_text(value),
        }],
        "thought" => vec![ChatStreamEvent::Affect {
            kind: AffectKind::Thought,
            value: content_text(value),
        }],
        "done" => {
            let mut events = Vec::new();
            if let Some(mood) = value
                .get("mood")
                .and_then(Value::as_str)
                .filter(|mood| !mood.is_empty())
            {
                events.push(ChatStreamEvent::Affect {
                    kind: AffectKind::Mood,
                    value: mood.to_owned(),
                });
            }
            events.push(ChatStreamEvent::Done);
            events
        }
        "stop" => vec![ChatStreamEvent::Stopped],
        "error" => {
            let message = value
                .get("content")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or("generation failed");
            vec![ChatStreamEvent::Error {
                message: message.to_owned(),
            }]
        }
        _ => Vec::new(),
    }
}

fn content_text(value: &Value) -> String {
    value
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_owned()
}

/// Stream event classified from one decoded bulk-indexing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SyncStreamEvent {
    #[serde(rename = "progress")]
    Progress { file: String },
    #[serde(rename = "done")]
    Done { total: u64 },
}

/// Classify one decoded record from the bulk-indexing stream.
pub fn classify_sync_record(value: &Value) -> Option<SyncStreamEvent> {
    match value.get("status").and_then(Value::as_str)? {
        "progress" => Some(SyncStreamEvent::Progress {
            file: value
                .get("file")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned(),
        }),
        "done" => Some(SyncStreamEvent::Done {
            total: value.get("total").and_then(Value::as_u64).unwrap_or(0),
        }),
        _ => None,
    }
}

/// Client-side projection of bulk-indexing progress.
///
/// The server reports file labels, not running totals; the processed count
/// is accumulated here and is monotonically non-decreasing until `terminal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub files_processed: u64,
    pub total_files: u64,
    pub current_file: String,
    pub terminal: bool,
}

/// Folds raw sync events into monotone [`SyncProgress`] projections.
#[derive(Debug, Default)]
pub struct SyncTracker {
    files_processed: u64,
}

impl SyncTracker {
    pub fn apply(&mut self, event: &SyncStreamEvent) -> SyncProgress {
        match event {
            SyncStreamEvent::Progress { file } => {
                self.files_processed += 1;
                SyncProgress {
                    files_processed: self.files_processed,
                    total_files: 0,
                    current_file: file.clone(),
                    terminal: false,
                }
            }
            SyncStreamEvent::Done { total } => SyncProgress {
                files_processed: self.files_processed,
                total_files: *total,
                current_file: String::new(),
                terminal: true,
            },
        }
    }
}
