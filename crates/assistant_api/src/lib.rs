//! Transport-only client primitives for the assistant backend.
//!
//! This crate owns request/response building and stream decoding for the
//! backend's newline-delimited JSON endpoints only. It intentionally contains
//! no conversation state and no UI coupling; the session layer consumes the
//! typed events this crate produces.
//!
//! Two streaming exchanges share one decoding discipline: the generation
//! stream (`/chat`) and the bulk indexing stream (`/vault/sync`). Both are
//! decoded by [`NdjsonStreamParser`] and classified in [`events`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod ndjson;
pub mod payload;
pub mod url;

pub use client::AssistantApiClient;
pub use client::CancellationSignal;
pub use config::AssistantApiConfig;
pub use error::AssistantApiError;
pub use events::{AffectKind, ChatOutcome, ChatStreamEvent, SyncProgress, SyncStreamEvent, SyncTracker};
pub use ndjson::NdjsonStreamParser;
pub use payload::{ChatMessage, ChatRequest, HealthStatus, Role};
pub use url::endpoint_url;
