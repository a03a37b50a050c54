use std::time::Duration;

use assistant_api::{AffectKind, ChatMessage, Role};

use crate::mood::{Mood, MoodState};

pub type ExchangeId = u64;

/// Suffix appended to a reply truncated by a user cancel.
pub const TRUNCATION_MARKER: &str = " [STOPPED]";
/// Sentinel prefix marking a specialized instruction rather than chat text.
pub const TASK_PREFIX: &str = "#task:";
/// Prefix for the system message injected when project context loads.
pub const CONTEXT_PREFIX: &str = "[PROJECT SUMMARY LOADED]: ";
/// Delay before mood reverts to baseline after a task-tagged exchange.
pub const BASELINE_RESET_DELAY: Duration = Duration::from_secs(10);

/// Lifecycle phase of the one allowed in-flight exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// The exchange was handed to the host but has not opened yet.
    Sending { exchange_id: ExchangeId },
    Streaming { exchange_id: ExchangeId },
}

/// One transcript entry; assistant entries are tagged with their exchange so
/// accumulation never relies on last-index position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub streaming: bool,
    pub exchange_id: Option<ExchangeId>,
}

impl SessionMessage {
    fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            streaming: false,
            exchange_id: None,
        }
    }

    fn system(content: String) -> Self {
        Self {
            role: Role::System,
            content,
            streaming: false,
            exchange_id: None,
        }
    }

    fn assistant_placeholder(exchange_id: ExchangeId) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
            exchange_id: Some(exchange_id),
        }
    }
}

/// Side effects the session is allowed to request from its runtime.
pub trait SessionHost {
    fn start_exchange(
        &mut self,
        prompt: String,
        history: Vec<ChatMessage>,
    ) -> Result<ExchangeId, String>;
    fn cancel_exchange(&mut self, exchange_id: ExchangeId);
    /// Out-of-band stop notification; may race the cancel signal.
    fn request_stop(&mut self);
    /// Arm the one-shot baseline reversion, replacing any pending timer.
    fn arm_mood_reset(&mut self, delay: Duration);
    fn clear_mood_reset(&mut self);
    fn request_render(&mut self);
}

/// Conversation state machine.
///
/// Owns the ordered transcript and the single in-flight exchange. Event
/// handlers guard on the exchange id, so events from a stale or cancelled
/// exchange never mutate newer state.
#[derive(Debug)]
pub struct ChatSession {
    phase: Phase,
    transcript: Vec<SessionMessage>,
    mood: MoodState,
    current_thought: Option<String>,
    task_tagged: bool,
    truncated: bool,
    cancelling: Option<ExchangeId>,
    external_prompt: Option<String>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            transcript: Vec::new(),
            mood: MoodState::default(),
            current_thought: None,
            task_tagged: false,
            truncated: false,
            cancelling: None,
            external_prompt: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[SessionMessage] {
        &self.transcript
    }

    pub fn mood(&self) -> &Mood {
        self.mood.current()
    }

    pub fn current_thought(&self) -> Option<&str> {
        self.current_thought.as_deref()
    }

    /// Transcript projected into the wire history shape.
    pub fn wire_history(&self) -> Vec<ChatMessage> {
        self.transcript
            .iter()
            .map(|message| ChatMessage {
                role: message.role,
                content: message.content.clone(),
            })
            .collect()
    }

    /// Submit a user prompt. A blank prompt, or any phase other than idle,
    /// leaves the session untouched; a second send is rejected, not queued.
    pub fn send(&mut self, text: impl Into<String>, host: &mut dyn SessionHost) {
        let prompt = text.into().trim().to_string();
        if prompt.is_empty() || self.phase != Phase::Idle {
            return;
        }

        self.transcript.push(SessionMessage::user(prompt.clone()));
        self.task_tagged = prompt.starts_with(TASK_PREFIX);
        self.truncated = false;
        self.current_thought = None;
        self.set_mood(Mood::thinking(), host);

        match host.start_exchange(prompt, self.wire_history()) {
            Ok(exchange_id) => {
                self.phase = Phase::Sending { exchange_id };
            }
            Err(error) => {
                self.transcript
                    .push(SessionMessage::system(format!("Error: {error}")));
                self.phase = Phase::Idle;
            }
        }

        host.request_render();
    }

    /// Stash a prompt supplied by a collaborating editor view.
    pub fn set_external_prompt(&mut self, prompt: impl Into<String>) {
        self.external_prompt = Some(prompt.into());
    }

    /// Send the stashed external prompt, clearing it so it cannot re-fire.
    pub fn consume_external_prompt(&mut self, host: &mut dyn SessionHost) {
        if let Some(prompt) = self.external_prompt.take() {
            self.send(prompt, host);
        }
    }

    /// Append loaded project context as a system message; legal in any phase.
    pub fn load_context(&mut self, summary: &str) {
        self.transcript
            .push(SessionMessage::system(format!("{CONTEXT_PREFIX}{summary}")));
    }

    /// The exchange transport opened; show the pending-reply placeholder.
    pub fn on_exchange_opened(&mut self, exchange_id: ExchangeId) {
        if self.phase != (Phase::Sending { exchange_id }) {
            return;
        }

        if !self.has_assistant_entry(exchange_id) {
            self.transcript
                .push(SessionMessage::assistant_placeholder(exchange_id));
        }
        self.phase = Phase::Streaming { exchange_id };
    }

    /// Extend the placeholder, in place, in arrival order.
    pub fn on_chunk(&mut self, exchange_id: ExchangeId, text: &str) {
        if !self.is_active(exchange_id) {
            return;
        }

        if let Some(entry) = self.assistant_entry_mut(exchange_id) {
            entry.content.push_str(text);
        } else {
            // Chunk raced ahead of the opened event.
            self.transcript.push(SessionMessage {
                role: Role::Assistant,
                content: text.to_owned(),
                streaming: true,
                exchange_id: Some(exchange_id),
            });
            self.phase = Phase::Streaming { exchange_id };
        }
    }

    /// Apply a mood/thought side signal; content is unaffected.
    pub fn on_affect(
        &mut self,
        exchange_id: ExchangeId,
        kind: AffectKind,
        value: &str,
        host: &mut dyn SessionHost,
    ) {
        if !self.is_active(exchange_id) {
            return;
        }

        match kind {
            AffectKind::Mood => self.set_mood(Mood::new(value), host),
            AffectKind::Thought => self.current_thought = Some(value.to_owned()),
        }
    }

    pub fn on_finished(&mut self, exchange_id: ExchangeId, host: &mut dyn SessionHost) {
        if self.is_cancelling(exchange_id) {
            self.finalize_cancelled(exchange_id);
            return;
        }
        if !self.is_active(exchange_id) {
            return;
        }

        self.seal_assistant_entry(exchange_id);
        self.current_thought = None;
        self.phase = Phase::Idle;

        if self.task_tagged {
            self.set_mood(Mood::neutral(), host);
            self.mood.mark_reset_pending();
            host.arm_mood_reset(BASELINE_RESET_DELAY);
        }

        host.request_render();
    }

    pub fn on_failed(&mut self, exchange_id: ExchangeId, error: &str, host: &mut dyn SessionHost) {
        if self.is_cancelling(exchange_id) {
            self.finalize_cancelled(exchange_id);
            return;
        }
        if !self.is_active(exchange_id) {
            return;
        }

        self.seal_assistant_entry(exchange_id);
        self.current_thought = None;
        self.transcript
            .push(SessionMessage::system(format!("Error: {error}")));
        self.phase = Phase::Idle;
        host.request_render();
    }

    /// The backend acknowledged the cancel; bookkeeping only, the transcript
    /// was already finalized when the user cancelled.
    pub fn on_cancelled(&mut self, exchange_id: ExchangeId) {
        if self.is_cancelling(exchange_id) {
            self.finalize_cancelled(exchange_id);
        }
    }

    /// User-initiated cancel of the in-flight exchange.
    pub fn cancel(&mut self, host: &mut dyn SessionHost) {
        let exchange_id = match self.phase {
            Phase::Sending { exchange_id } | Phase::Streaming { exchange_id } => exchange_id,
            Phase::Idle => return,
        };

        self.cancelling = Some(exchange_id);
        self.phase = Phase::Idle;
        self.current_thought = None;

        host.cancel_exchange(exchange_id);
        host.request_stop();

        self.append_truncation_marker(exchange_id);
        host.request_render();
    }

    /// The baseline-reversion timer fired; stale fires are ignored.
    pub fn on_mood_reset(&mut self) {
        if self.mood.take_reset_pending() {
            self.mood.set(Mood::neutral());
        }
    }

    fn set_mood(&mut self, mood: Mood, host: &mut dyn SessionHost) {
        host.clear_mood_reset();
        self.mood.set(mood);
    }

    fn append_truncation_marker(&mut self, exchange_id: ExchangeId) {
        if self.truncated {
            return;
        }
        self.truncated = true;

        if let Some(entry) = self.assistant_entry_mut(exchange_id) {
            entry.content.push_str(TRUNCATION_MARKER);
            entry.streaming = false;
        } else {
            // Cancelled before the exchange opened; surface the truncation on
            // a placeholder so the transcript still records the attempt.
            self.transcript.push(SessionMessage {
                role: Role::Assistant,
                content: TRUNCATION_MARKER.trim_start().to_owned(),
                streaming: false,
                exchange_id: Some(exchange_id),
            });
        }
    }

    fn seal_assistant_entry(&mut self, exchange_id: ExchangeId) {
        if let Some(entry) = self.assistant_entry_mut(exchange_id) {
            entry.streaming = false;
        }
    }

    fn assistant_entry_mut(&mut self, exchange_id: ExchangeId) -> Option<&mut SessionMessage> {
        self.transcript.iter_mut().rev().find(|message| {
            message.role == Role::Assistant && message.exchange_id == Some(exchange_id)
        })
    }

    fn has_assistant_entry(&self, exchange_id: ExchangeId) -> bool {
        self.transcript.iter().any(|message| {
            message.role == Role::Assistant && message.exchange_id == Some(exchange_id)
        })
    }

    fn is_active(&self, exchange_id: ExchangeId) -> bool {
        matches!(
            self.phase,
            Phase::Sending { exchange_id: active } | Phase::Streaming { exchange_id: active }
                if active == exchange_id
        )
    }

    fn is_cancelling(&self, exchange_id: ExchangeId) -> bool {
        self.cancelling == Some(exchange_id)
    }

    fn finalize_cancelled(&mut self, exchange_id: ExchangeId) {
        if self.cancelling == Some(exchange_id) {
            self.cancelling = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingHost {
        next_exchange_id: ExchangeId,
        started: Vec<(String, usize)>,
        cancelled: Vec<ExchangeId>,
        stop_requests: usize,
        resets_armed: Vec<Duration>,
        resets_cleared: usize,
        fail_start: Option<String>,
    }

    impl SessionHost for RecordingHost {
        fn start_exchange(
            &mut self,
            prompt: String,
            history: Vec<ChatMessage>,
        ) -> Result<ExchangeId, String> {
            if let Some(error) = self.fail_start.clone() {
                return Err(error);
            }
            self.next_exchange_id += 1;
            self.started.push((prompt, history.len()));
            Ok(self.next_exchange_id)
        }

        fn cancel_exchange(&mut self, exchange_id: ExchangeId) {
            self.cancelled.push(exchange_id);
        }

        fn request_stop(&mut self) {
            self.stop_requests += 1;
        }

        fn arm_mood_reset(&mut self, delay: Duration) {
            self.resets_armed.push(delay);
        }

        fn clear_mood_reset(&mut self) {
            self.resets_cleared += 1;
        }

        fn request_render(&mut self) {}
    }

    fn streaming_session(host: &mut RecordingHost, prompt: &str) -> (ChatSession, ExchangeId) {
        let mut session = ChatSession::new();
        session.send(prompt, host);
        let exchange_id = match session.phase() {
            Phase::Sending { exchange_id } => exchange_id,
            phase => panic!("expected sending phase, got {phase:?}"),
        };
        session.on_exchange_opened(exchange_id);
        (session, exchange_id)
    }

    fn assistant_content(session: &ChatSession, exchange_id: ExchangeId) -> String {
        session
            .transcript()
            .iter()
            .find(|message| {
                message.role == Role::Assistant && message.exchange_id == Some(exchange_id)
            })
            .map(|message| message.content.clone())
            .unwrap_or_default()
    }

    #[test]
    fn blank_send_leaves_history_and_phase_untouched() {
        let mut host = RecordingHost::default();
        let mut session = ChatSession::new();

        session.send("", &mut host);
        session.send("   \n\t", &mut host);

        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.transcript().is_empty());
        assert!(host.started.is_empty());
    }

    #[test]
    fn send_pushes_user_message_and_sets_thinking_mood() {
        let mut host = RecordingHost::default();
        let (session, _) = streaming_session(&mut host, "hello there");

        assert_eq!(session.transcript()[0].role, Role::User);
        assert_eq!(session.transcript()[0].content, "hello there");
        assert_eq!(session.mood().as_str(), "thinking");
        // Request history carries the user turn but not the placeholder.
        assert_eq!(host.started, vec![("hello there".to_string(), 1)]);
    }

    #[test]
    fn send_while_busy_is_rejected_not_queued() {
        let mut host = RecordingHost::default();
        let (mut session, _) = streaming_session(&mut host, "first");
        let transcript_len = session.transcript().len();

        session.send("second", &mut host);

        assert_eq!(session.transcript().len(), transcript_len);
        assert_eq!(host.started.len(), 1);
        assert!(matches!(session.phase(), Phase::Streaming { .. }));
    }

    #[test]
    fn chunks_accumulate_in_order_at_a_fixed_position() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_chunk(exchange_id, "Hel");
        assert_eq!(assistant_content(&session, exchange_id), "Hel");
        session.on_chunk(exchange_id, "lo");
        assert_eq!(assistant_content(&session, exchange_id), "Hello");

        // The placeholder never moves.
        assert_eq!(session.transcript()[1].exchange_id, Some(exchange_id));
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn done_seals_the_reply_and_returns_to_idle() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_chunk(exchange_id, "Hel");
        session.on_chunk(exchange_id, "lo");
        session.on_finished(exchange_id, &mut host);

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(assistant_content(&session, exchange_id), "Hello");
        assert!(!session.transcript()[1].streaming);
        assert!(host.resets_armed.is_empty());
    }

    #[test]
    fn error_appends_system_message_and_returns_to_idle() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_chunk(exchange_id, "partial");
        session.on_failed(exchange_id, "backend unreachable", &mut host);

        assert_eq!(session.phase(), Phase::Idle);
        let last = session.transcript().last().expect("system entry");
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, "Error: backend unreachable");
    }

    #[test]
    fn failed_start_reports_inline_and_stays_idle() {
        let mut host = RecordingHost {
            fail_start: Some("connection refused".to_string()),
            ..RecordingHost::default()
        };
        let mut session = ChatSession::new();

        session.send("hi", &mut host);

        assert_eq!(session.phase(), Phase::Idle);
        let last = session.transcript().last().expect("system entry");
        assert_eq!(last.content, "Error: connection refused");
    }

    #[test]
    fn cancel_tears_down_and_marks_truncation_once() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_chunk(exchange_id, "partial");
        session.cancel(&mut host);

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(host.cancelled, vec![exchange_id]);
        assert_eq!(host.stop_requests, 1);
        assert_eq!(
            assistant_content(&session, exchange_id),
            format!("partial{TRUNCATION_MARKER}")
        );

        // A terminal racing in right after the cancel must not re-mark.
        session.on_finished(exchange_id, &mut host);
        session.on_cancelled(exchange_id);
        assert_eq!(
            assistant_content(&session, exchange_id),
            format!("partial{TRUNCATION_MARKER}")
        );
    }

    #[test]
    fn events_after_cancel_do_not_mutate_the_transcript() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_chunk(exchange_id, "partial");
        session.cancel(&mut host);
        let snapshot = session.transcript().to_vec();

        session.on_chunk(exchange_id, " more");
        session.on_affect(exchange_id, AffectKind::Mood, "happy", &mut host);
        session.on_failed(exchange_id, "late failure", &mut host);

        assert_eq!(session.transcript(), snapshot.as_slice());
    }

    #[test]
    fn cancel_when_idle_is_a_noop() {
        let mut host = RecordingHost::default();
        let mut session = ChatSession::new();

        session.cancel(&mut host);

        assert!(host.cancelled.is_empty());
        assert_eq!(host.stop_requests, 0);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn mood_affect_applies_immediately_without_arming_a_timer() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_affect(exchange_id, AffectKind::Mood, "happy", &mut host);

        assert_eq!(session.mood().as_str(), "happy");
        assert!(host.resets_armed.is_empty());

        session.on_finished(exchange_id, &mut host);
        assert_eq!(session.mood().as_str(), "happy");
    }

    #[test]
    fn task_tagged_completion_reverts_to_baseline_with_a_timer() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "#task:fact_check\ncheck this");

        session.on_affect(exchange_id, AffectKind::Mood, "surprised", &mut host);
        session.on_finished(exchange_id, &mut host);

        assert!(session.mood().is_neutral());
        assert_eq!(host.resets_armed, vec![BASELINE_RESET_DELAY]);

        session.on_mood_reset();
        assert!(session.mood().is_neutral());
    }

    #[test]
    fn new_mood_signal_invalidates_a_pending_reversion() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "#task:fact_check\ngo");
        session.on_finished(exchange_id, &mut host);
        let cleared_before = host.resets_cleared;

        session.send("follow-up", &mut host);
        let next_id = match session.phase() {
            Phase::Sending { exchange_id } => exchange_id,
            phase => panic!("expected sending phase, got {phase:?}"),
        };
        session.on_exchange_opened(next_id);
        session.on_affect(next_id, AffectKind::Mood, "sad", &mut host);

        assert!(host.resets_cleared > cleared_before);
        assert_eq!(session.mood().as_str(), "sad");

        // The original timer firing now must not override the newer signal.
        session.on_mood_reset();
        assert_eq!(session.mood().as_str(), "sad");
    }

    #[test]
    fn stale_mood_reset_without_pending_flag_is_ignored() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");
        session.on_affect(exchange_id, AffectKind::Mood, "scared", &mut host);

        session.on_mood_reset();

        assert_eq!(session.mood().as_str(), "scared");
    }

    #[test]
    fn thought_signal_is_transient_and_cleared_at_terminal() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_affect(exchange_id, AffectKind::Thought, "recalling notes", &mut host);
        assert_eq!(session.current_thought(), Some("recalling notes"));

        session.on_finished(exchange_id, &mut host);
        assert_eq!(session.current_thought(), None);
    }

    #[test]
    fn external_prompt_is_consumed_exactly_once() {
        let mut host = RecordingHost::default();
        let mut session = ChatSession::new();

        session.set_external_prompt("#task:fact_check\ndraft body");
        session.consume_external_prompt(&mut host);
        assert_eq!(host.started.len(), 1);

        // The injection source was cleared; nothing re-triggers.
        let exchange_id = match session.phase() {
            Phase::Sending { exchange_id } => exchange_id,
            phase => panic!("expected sending phase, got {phase:?}"),
        };
        session.on_exchange_opened(exchange_id);
        session.on_finished(exchange_id, &mut host);
        session.consume_external_prompt(&mut host);
        assert_eq!(host.started.len(), 1);
    }

    #[test]
    fn context_load_appends_system_message_in_any_phase() {
        let mut host = RecordingHost::default();
        let (mut session, _) = streaming_session(&mut host, "hi");

        session.load_context("a story about tides");

        let last = session.transcript().last().expect("context entry");
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, format!("{CONTEXT_PREFIX}a story about tides"));
        assert!(matches!(session.phase(), Phase::Streaming { .. }));
    }

    #[test]
    fn stale_exchange_events_are_ignored() {
        let mut host = RecordingHost::default();
        let (mut session, exchange_id) = streaming_session(&mut host, "hi");

        session.on_chunk(exchange_id + 7, "stale");
        session.on_affect(exchange_id + 7, AffectKind::Mood, "angry", &mut host);
        session.on_finished(exchange_id + 7, &mut host);

        assert_eq!(assistant_content(&session, exchange_id), "");
        assert_eq!(session.mood().as_str(), "thinking");
        assert!(matches!(session.phase(), Phase::Streaming { .. }));
    }
}
