use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};

use crate::config::AssistantApiConfig;
use crate::error::{parse_error_message, AssistantApiError};
use crate::events::{
    classify_chat_record, classify_sync_record, ChatOutcome, ChatStreamEvent, SyncProgress,
    SyncTracker,
};
use crate::ndjson::NdjsonStreamParser;
use crate::payload::{ChatRequest, FixGrammarRequest, FixGrammarResponse, HealthReport, HealthStatus};
use crate::url::endpoint_url;

/// Optional cancellation signal shared across request and stream loops.
///
/// Once set, no further events are delivered and the transport is dropped;
/// bytes already in flight are discarded, not rolled back.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct AssistantApiClient {
    http: Client,
    config: AssistantApiConfig,
}

impl AssistantApiClient {
    pub fn new(config: AssistantApiConfig) -> Result<Self, AssistantApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = config.user_agent.as_deref() {
            builder = builder.user_agent(user_agent);
        }
        let http = builder.build().map_err(AssistantApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AssistantApiConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint_url(&self.config.base_url, path)
    }

    pub fn build_chat_request(&self, request: &ChatRequest) -> RequestBuilder {
        self.http.post(self.endpoint("/chat")).json(request)
    }

    /// Open the generation exchange and deliver classified events in arrival
    /// order.
    ///
    /// `on_event` observes chunks, affect signals, and the non-error terminal
    /// record. A `type: error` record surfaces as
    /// [`AssistantApiError::Backend`] instead of an event, exactly like a
    /// transport failure. End-of-stream without a terminal record resolves as
    /// [`ChatOutcome::Completed`].
    pub async fn stream_chat<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<ChatOutcome, AssistantApiError>
    where
        F: FnMut(ChatStreamEvent),
    {
        let response = self
            .send_streaming(self.build_chat_request(request), cancellation)
            .await?;
        let mut bytes = response.bytes_stream();
        let mut parser = NdjsonStreamParser::default();
        let mut outcome = None;

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(AssistantApiError::Cancelled);
            }
            let chunk = chunk.map_err(AssistantApiError::from)?;
            for record in parser.feed(&chunk) {
                for event in classify_chat_record(&record) {
                    match event {
                        ChatStreamEvent::Error { message } => {
                            return Err(AssistantApiError::Backend { message });
                        }
                        ChatStreamEvent::Done => {
                            outcome = Some(ChatOutcome::Completed);
                            on_event(ChatStreamEvent::Done);
                        }
                        ChatStreamEvent::Stopped => {
                            outcome = Some(ChatOutcome::Stopped);
                            on_event(ChatStreamEvent::Stopped);
                        }
                        event => on_event(event),
                    }
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(AssistantApiError::Cancelled);
        }

        Ok(outcome.unwrap_or(ChatOutcome::Completed))
    }

    /// Notify the backend out-of-band that generation should halt.
    ///
    /// Independent of the cancellation signal; the two may race and both
    /// orders are tolerated.
    pub async fn request_stop(&self) -> Result<(), AssistantApiError> {
        let response = self
            .http
            .post(self.endpoint("/stop"))
            .send()
            .await
            .map_err(AssistantApiError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }
        Ok(())
    }

    /// Open the bulk indexing exchange and deliver accumulated progress.
    ///
    /// No cancellation handle is exposed; the job runs to completion or
    /// failure, and an abandoning caller simply stops observing. Resolves to
    /// the server-reported total on completion.
    pub async fn stream_vault_sync<F>(&self, mut on_progress: F) -> Result<u64, AssistantApiError>
    where
        F: FnMut(SyncProgress),
    {
        let response = self
            .send_streaming(self.http.post(self.endpoint("/vault/sync")), None)
            .await?;
        let mut bytes = response.bytes_stream();
        let mut parser = NdjsonStreamParser::default();
        let mut tracker = SyncTracker::default();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(AssistantApiError::from)?;
            for record in parser.feed(&chunk) {
                if let Some(event) = classify_sync_record(&record) {
                    let progress = tracker.apply(&event);
                    let terminal = progress.terminal;
                    let total = progress.total_files;
                    on_progress(progress);
                    if terminal {
                        return Ok(total);
                    }
                }
            }
        }

        Err(AssistantApiError::Backend {
            message: "indexing stream ended without a completion record".to_owned(),
        })
    }

    /// Synchronous grammar-correction exchange; not a stream.
    ///
    /// Returns the corrected text, or [`AssistantApiError::Backend`] when the
    /// response body carries an `error` field.
    pub async fn fix_grammar(&self, content: &str) -> Result<String, AssistantApiError> {
        let response = self
            .http
            .post(self.endpoint("/vault/fix-grammar"))
            .json(&FixGrammarRequest {
                content: content.to_owned(),
            })
            .send()
            .await
            .map_err(AssistantApiError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        let payload: FixGrammarResponse = response.json().await.map_err(AssistantApiError::from)?;
        if let Some(message) = payload.error.filter(|message| !message.is_empty()) {
            return Err(AssistantApiError::Backend { message });
        }
        payload.fixed.ok_or_else(|| {
            AssistantApiError::Unknown(
                "correction response carried neither 'fixed' nor 'error'".to_owned(),
            )
        })
    }

    /// Poll backend liveness; any transport failure reads as offline.
    pub async fn check_health(&self) -> HealthStatus {
        let response = self.http.get(self.endpoint("/health")).send().await;
        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthReport>().await {
                    Ok(report) if report.status == "online" => HealthStatus::Online,
                    _ => HealthStatus::Offline,
                }
            }
            _ => HealthStatus::Offline,
        }
    }

    async fn send_streaming(
        &self,
        request: RequestBuilder,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, AssistantApiError> {
        if is_cancelled(cancellation) {
            return Err(AssistantApiError::Cancelled);
        }

        let response = await_or_cancel(request.send(), cancellation)
            .await?
            .map_err(AssistantApiError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(AssistantApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        Ok(response)
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, AssistantApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(AssistantApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(AssistantApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
