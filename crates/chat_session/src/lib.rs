//! Conversation session state machine and its runtime host.
//!
//! [`session::ChatSession`] is a pure state machine: it owns the ordered
//! transcript, the in-flight generation phase, and the mood policy, and it
//! reaches the outside world only through the [`session::SessionHost`] trait.
//! [`runtime::SessionController`] is the default host: it runs one backend
//! exchange at a time on a worker thread, queues lifecycle events, and
//! applies them on the caller's thread in arrival order.

pub mod api_backend;
pub mod backend;
pub mod mood;
pub mod runtime;
pub mod session;

pub use api_backend::ApiChatBackend;
pub use backend::{CancelSignal, ChatBackend, ExchangeEvent, ExchangeRequest, MockChatBackend};
pub use mood::{Mood, MoodState};
pub use runtime::SessionController;
pub use session::{ChatSession, ExchangeId, Phase, SessionHost, SessionMessage};
