use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assistant_api::{AffectKind, ChatMessage};

use crate::session::ExchangeId;

/// Shared cancellation flag for one exchange.
pub type CancelSignal = Arc<AtomicBool>;

/// Input required to run one generation exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub exchange_id: ExchangeId,
    pub prompt: String,
    pub history: Vec<ChatMessage>,
}

/// Lifecycle event emitted by a backend for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeEvent {
    Opened { exchange_id: ExchangeId },
    Chunk { exchange_id: ExchangeId, text: String },
    Affect {
        exchange_id: ExchangeId,
        kind: AffectKind,
        value: String,
    },
    Finished { exchange_id: ExchangeId },
    Failed { exchange_id: ExchangeId, error: String },
    Cancelled { exchange_id: ExchangeId },
}

impl ExchangeEvent {
    #[must_use]
    pub fn exchange_id(&self) -> ExchangeId {
        match self {
            Self::Opened { exchange_id }
            | Self::Chunk { exchange_id, .. }
            | Self::Affect { exchange_id, .. }
            | Self::Finished { exchange_id }
            | Self::Failed { exchange_id, .. }
            | Self::Cancelled { exchange_id } => *exchange_id,
        }
    }

    /// True when this event terminates the exchange lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Backend seam for executing one generation exchange.
pub trait ChatBackend: Send + Sync + 'static {
    /// Executes one exchange, emitting lifecycle events in order. Exactly one
    /// terminal event is expected per run that returns `Ok`.
    fn run(
        &self,
        req: ExchangeRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(ExchangeEvent),
    ) -> Result<(), String>;

    /// Out-of-band stop notification; default no-op for backends without
    /// such a channel.
    fn notify_stop(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Deterministic scripted backend for tests and offline development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockChatBackend {
    chunks: Vec<String>,
    mood: Option<String>,
    chunk_delay: Duration,
}

impl MockChatBackend {
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            mood: None,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new(vec![
            "Here is a first pass at the paragraph. ".to_string(),
            "The imagery holds together, ".to_string(),
            "though the closing line could land harder.".to_string(),
        ])
        .with_mood("happy")
    }
}

impl ChatBackend for MockChatBackend {
    fn run(
        &self,
        req: ExchangeRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(ExchangeEvent),
    ) -> Result<(), String> {
        let exchange_id = req.exchange_id;
        let _ = (req.prompt, req.history);

        emit(ExchangeEvent::Opened { exchange_id });

        for chunk in &self.chunks {
            if cancel.load(Ordering::SeqCst) {
                emit(ExchangeEvent::Cancelled { exchange_id });
                return Ok(());
            }

            if !self.chunk_delay.is_zero() {
                thread::sleep(self.chunk_delay);
            }

            emit(ExchangeEvent::Chunk {
                exchange_id,
                text: chunk.clone(),
            });
        }

        if let Some(mood) = &self.mood {
            emit(ExchangeEvent::Affect {
                exchange_id,
                kind: AffectKind::Mood,
                value: mood.clone(),
            });
        }

        if cancel.load(Ordering::SeqCst) {
            emit(ExchangeEvent::Cancelled { exchange_id });
        } else {
            emit(ExchangeEvent::Finished { exchange_id });
        }

        Ok(())
    }
}
