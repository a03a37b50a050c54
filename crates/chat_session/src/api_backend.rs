//! HTTP-backed implementation of the [`ChatBackend`] seam.
//!
//! Bridges the async transport into the synchronous backend contract with a
//! current-thread runtime, so the session layer never touches async code.

use assistant_api::{
    AssistantApiClient, AssistantApiConfig, AssistantApiError, ChatRequest, ChatStreamEvent,
};

use crate::backend::{CancelSignal, ChatBackend, ExchangeEvent, ExchangeRequest};

pub struct ApiChatBackend {
    client: AssistantApiClient,
}

impl ApiChatBackend {
    pub fn new(config: AssistantApiConfig) -> Result<Self, AssistantApiError> {
        Ok(Self {
            client: AssistantApiClient::new(config)?,
        })
    }

    pub fn client(&self) -> &AssistantApiClient {
        &self.client
    }

    fn blocking_runtime() -> Result<tokio::runtime::Runtime, String> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("failed to initialize tokio runtime: {error}"))
    }
}

impl ChatBackend for ApiChatBackend {
    fn run(
        &self,
        req: ExchangeRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(ExchangeEvent),
    ) -> Result<(), String> {
        let exchange_id = req.exchange_id;
        let runtime = Self::blocking_runtime()?;

        emit(ExchangeEvent::Opened { exchange_id });

        let request = ChatRequest::new(req.prompt, req.history);
        let outcome = {
            let emit = &mut *emit;
            runtime.block_on(self.client.stream_chat(&request, Some(&cancel), |event| {
                match event {
                    ChatStreamEvent::Chunk { text } => emit(ExchangeEvent::Chunk {
                        exchange_id,
                        text,
                    }),
                    ChatStreamEvent::Affect { kind, value } => emit(ExchangeEvent::Affect {
                        exchange_id,
                        kind,
                        value,
                    }),
                    // Terminals surface through the stream result below.
                    ChatStreamEvent::Done
                    | ChatStreamEvent::Stopped
                    | ChatStreamEvent::Error { .. } => {}
                }
            }))
        };

        match outcome {
            Ok(_) => emit(ExchangeEvent::Finished { exchange_id }),
            Err(AssistantApiError::Cancelled) => emit(ExchangeEvent::Cancelled { exchange_id }),
            Err(error) => emit(ExchangeEvent::Failed {
                exchange_id,
                error: error.to_string(),
            }),
        }

        Ok(())
    }

    fn notify_stop(&self) -> Result<(), String> {
        let runtime = Self::blocking_runtime()?;
        runtime
            .block_on(self.client.request_stop())
            .map_err(|error| error.to_string())
    }
}
