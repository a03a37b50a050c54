/// Affective value shown alongside the conversation.
///
/// The backend emits free-form mood names; only the neutral baseline and the
/// reflective value used while a reply is pending are fixed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mood(String);

impl Mood {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn neutral() -> Self {
        Self("neutral".to_string())
    }

    pub fn thinking() -> Self {
        Self("thinking".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_neutral(&self) -> bool {
        self.0 == "neutral"
    }
}

impl Default for Mood {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Current mood plus the single pending baseline-reversion slot.
///
/// Invariant: at most one reversion may be pending; any mood change clears
/// it, so a stale timer fire can never override a newer signal.
#[derive(Debug, Default)]
pub struct MoodState {
    current: Mood,
    reset_pending: bool,
}

impl MoodState {
    pub fn current(&self) -> &Mood {
        &self.current
    }

    /// Apply a new mood, dropping any pending reversion.
    pub fn set(&mut self, mood: Mood) {
        self.current = mood;
        self.reset_pending = false;
    }

    pub fn mark_reset_pending(&mut self) {
        self.reset_pending = true;
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Consume the pending flag; true when a reversion should apply now.
    pub fn take_reset_pending(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }
}
