use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use assistant_api::ChatMessage;

use crate::backend::{CancelSignal, ChatBackend, ExchangeEvent, ExchangeRequest};
use crate::session::{ChatSession, ExchangeId, SessionHost};

const TIMER_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
enum QueuedEvent {
    Exchange(ExchangeEvent),
    MoodReset,
}

struct ActiveExchange {
    exchange_id: ExchangeId,
    cancel: CancelSignal,
    join_handle: Option<JoinHandle<()>>,
}

struct MoodResetTimer {
    cancelled: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl MoodResetTimer {
    fn cancel(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }
}

/// Runtime host for a [`ChatSession`].
///
/// Backend workers only enqueue events; [`SessionController::flush_pending_events`]
/// applies them on the calling thread in arrival order, so the session always
/// observes one logical thread of control.
pub struct SessionController {
    session: Arc<Mutex<ChatSession>>,
    pending_events: Arc<Mutex<VecDeque<QueuedEvent>>>,
    next_exchange_id: AtomicU64,
    active_exchange: Mutex<Option<ActiveExchange>>,
    mood_reset: Mutex<Option<MoodResetTimer>>,
    render_requested: AtomicBool,
    backend: Arc<dyn ChatBackend>,
}

impl SessionController {
    pub fn new(session: Arc<Mutex<ChatSession>>, backend: Arc<dyn ChatBackend>) -> Arc<Self> {
        Arc::new(Self {
            session,
            pending_events: Arc::new(Mutex::new(VecDeque::new())),
            next_exchange_id: AtomicU64::new(1),
            active_exchange: Mutex::new(None),
            mood_reset: Mutex::new(None),
            render_requested: AtomicBool::new(false),
            backend,
        })
    }

    /// Drains queued events into the session. Call from the observing thread
    /// whenever it is ready to fold in new state; returns how many events
    /// were applied.
    pub fn flush_pending_events(self: &Arc<Self>) -> usize {
        let mut drained = 0usize;

        loop {
            let event = {
                let mut pending_events = lock_unpoisoned(&self.pending_events);
                pending_events.pop_front()
            };

            match event {
                Some(event) => {
                    self.apply_event(event);
                    drained += 1;
                }
                None => break,
            }
        }

        drained
    }

    /// Consume the redraw flag set by session-side effects.
    pub fn take_render_request(&self) -> bool {
        self.render_requested.swap(false, Ordering::SeqCst)
    }

    fn start_exchange_internal(
        self: &Arc<Self>,
        prompt: String,
        history: Vec<ChatMessage>,
    ) -> Result<ExchangeId, String> {
        let mut active_exchange = self.lock_active_exchange();
        if active_exchange.is_some() {
            return Err("Exchange already active".to_string());
        }

        let exchange_id = self.next_exchange_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let request = ExchangeRequest {
            exchange_id,
            prompt,
            history,
        };
        let join_handle = self.spawn_worker(request, Arc::clone(&cancel))?;

        *active_exchange = Some(ActiveExchange {
            exchange_id,
            cancel,
            join_handle: Some(join_handle),
        });

        Ok(exchange_id)
    }

    fn spawn_worker(
        self: &Arc<Self>,
        request: ExchangeRequest,
        cancel: CancelSignal,
    ) -> Result<JoinHandle<()>, String> {
        let exchange_id = request.exchange_id;
        let controller = Arc::clone(self);
        thread::Builder::new()
            .name(format!("assistant-exchange-{exchange_id}"))
            .spawn(move || controller.run_worker(request, cancel))
            .map_err(|error| format!("Failed to spawn exchange worker: {error}"))
    }

    fn run_worker(self: Arc<Self>, request: ExchangeRequest, cancel: CancelSignal) {
        let exchange_id = request.exchange_id;

        let terminal_emitted = Arc::new(AtomicBool::new(false));
        let terminal_emitted_for_emit = Arc::clone(&terminal_emitted);
        let controller = Arc::clone(&self);
        let backend = Arc::clone(&self.backend);

        let mut emit = move |event: ExchangeEvent| {
            if event.is_terminal() {
                terminal_emitted_for_emit.store(true, Ordering::SeqCst);
            }

            controller.enqueue_event(QueuedEvent::Exchange(event));
        };

        let run_outcome = catch_unwind(AssertUnwindSafe(|| {
            backend.run(request, Arc::clone(&cancel), &mut emit)
        }));

        match run_outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => emit(ExchangeEvent::Failed { exchange_id, error }),
            Err(_) => emit(ExchangeEvent::Failed {
                exchange_id,
                error: "Chat backend panicked".to_string(),
            }),
        }

        if !terminal_emitted.load(Ordering::SeqCst) && self.is_active_exchange_id(exchange_id) {
            emit(ExchangeEvent::Failed {
                exchange_id,
                error: "Chat backend exited without terminal event".to_string(),
            });
        }
    }

    fn enqueue_event(self: &Arc<Self>, event: QueuedEvent) {
        let mut pending_events = lock_unpoisoned(&self.pending_events);
        pending_events.push_back(event);
    }

    fn apply_event(self: &Arc<Self>, event: QueuedEvent) {
        match event {
            QueuedEvent::Exchange(event) => {
                let exchange_id = event.exchange_id();
                let terminal = event.is_terminal();

                {
                    let mut session = lock_unpoisoned(&self.session);
                    let mut host = Arc::clone(self);
                    match event {
                        ExchangeEvent::Opened { exchange_id } => {
                            session.on_exchange_opened(exchange_id);
                        }
                        ExchangeEvent::Chunk { exchange_id, text } => {
                            session.on_chunk(exchange_id, &text);
                        }
                        ExchangeEvent::Affect {
                            exchange_id,
                            kind,
                            value,
                        } => session.on_affect(exchange_id, kind, &value, &mut host),
                        ExchangeEvent::Finished { exchange_id } => {
                            session.on_finished(exchange_id, &mut host);
                        }
                        ExchangeEvent::Failed { exchange_id, error } => {
                            session.on_failed(exchange_id, &error, &mut host);
                        }
                        ExchangeEvent::Cancelled { exchange_id } => {
                            session.on_cancelled(exchange_id);
                        }
                    }
                }

                if terminal {
                    self.clear_active_if_matching(exchange_id);
                }
            }
            QueuedEvent::MoodReset => {
                let mut session = lock_unpoisoned(&self.session);
                session.on_mood_reset();
            }
        }
    }

    fn clear_active_if_matching(&self, exchange_id: ExchangeId) {
        let mut active_exchange = self.lock_active_exchange();
        let matches =
            active_exchange.as_ref().map(|active| active.exchange_id) == Some(exchange_id);
        if !matches {
            return;
        }

        let mut completed = match active_exchange.take() {
            Some(completed) => completed,
            None => return,
        };

        if let Some(join_handle) = completed.join_handle.take() {
            let is_current_thread = join_handle.thread().id() == thread::current().id();
            if !is_current_thread && join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    fn is_active_exchange_id(&self, exchange_id: ExchangeId) -> bool {
        self.lock_active_exchange()
            .as_ref()
            .map(|active| active.exchange_id)
            == Some(exchange_id)
    }

    fn cancel_exchange_internal(&self, exchange_id: ExchangeId) {
        let active_exchange = self.lock_active_exchange();
        if let Some(active_exchange) = active_exchange.as_ref() {
            if active_exchange.exchange_id == exchange_id {
                active_exchange.cancel.store(true, Ordering::SeqCst);
            }
        }
    }

    fn request_stop_internal(&self) {
        let backend = Arc::clone(&self.backend);
        // Fire-and-forget; cancellation already tears down the transport.
        let _ = thread::Builder::new()
            .name("assistant-stop".to_string())
            .spawn(move || {
                let _ = backend.notify_stop();
            });
    }

    fn arm_mood_reset_internal(self: &Arc<Self>, delay: Duration) {
        let mut slot = lock_unpoisoned(&self.mood_reset);
        if let Some(previous) = slot.take() {
            previous.cancel();
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let controller = Arc::clone(self);
        let flag = Arc::clone(&cancelled);
        let join_handle = thread::Builder::new()
            .name("mood-reset-timer".to_string())
            .spawn(move || {
                let deadline = Instant::now() + delay;
                loop {
                    if flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep((deadline - now).min(TIMER_POLL_INTERVAL));
                }

                if !flag.load(Ordering::SeqCst) {
                    controller.enqueue_event(QueuedEvent::MoodReset);
                }
            })
            .ok();

        *slot = Some(MoodResetTimer {
            cancelled,
            join_handle,
        });
    }

    fn clear_mood_reset_internal(&self) {
        let mut slot = lock_unpoisoned(&self.mood_reset);
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
    }

    fn lock_active_exchange(&self) -> MutexGuard<'_, Option<ActiveExchange>> {
        lock_unpoisoned(&self.active_exchange)
    }
}

impl SessionHost for Arc<SessionController> {
    fn start_exchange(
        &mut self,
        prompt: String,
        history: Vec<ChatMessage>,
    ) -> Result<ExchangeId, String> {
        self.start_exchange_internal(prompt, history)
    }

    fn cancel_exchange(&mut self, exchange_id: ExchangeId) {
        self.cancel_exchange_internal(exchange_id);
    }

    fn request_stop(&mut self) {
        self.request_stop_internal();
    }

    fn arm_mood_reset(&mut self, delay: Duration) {
        self.arm_mood_reset_internal(delay);
    }

    fn clear_mood_reset(&mut self) {
        self.clear_mood_reset_internal();
    }

    fn request_render(&mut self) {
        self.render_requested.store(true, Ordering::SeqCst);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
