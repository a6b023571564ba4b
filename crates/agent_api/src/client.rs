use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use agent_protocol::{CancelSignal, ChatRequest, HistoryMessage, StreamChunk, WireEvent};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use ::url::Url;

use crate::config::AgentApiConfig;
use crate::error::{parse_error_message, ApiError};
use crate::headers::build_headers;
use crate::payload::with_transport_defaults;
use crate::sse::FrameParser;
use crate::url::{normalize_stream_url, thread_url};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct AgentApiClient {
    http: Client,
    config: AgentApiConfig,
}

/// Counters describing a stream that ran to end-of-input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub events: usize,
    pub skipped_frames: usize,
    pub terminal_seen: bool,
}

impl AgentApiClient {
    pub fn new(config: AgentApiConfig) -> Result<Self, ApiError> {
        normalize_stream_url(&config.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AgentApiConfig {
        &self.config
    }

    pub fn stream_endpoint(&self) -> Result<Url, ApiError> {
        normalize_stream_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config) {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let headers = self.build_headers()?;
        let payload = with_transport_defaults(request, &self.config);
        Ok(self
            .http
            .post(self.stream_endpoint()?)
            .headers(headers)
            .json(&payload))
    }

    /// Sends `request` once. Non-success statuses fail with the parsed body message.
    pub async fn send(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
    ) -> Result<Response, ApiError> {
        if is_cancelled(cancellation) {
            return Err(ApiError::Cancelled);
        }

        let response = await_or_cancel(self.build_request(request)?.send(), cancellation)
            .await?
            .map_err(ApiError::from)?;
        ensure_success(response, cancellation).await
    }

    /// Streams `request`, invoking `on_event` for each decoded event before the next read.
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
        mut on_event: F,
    ) -> Result<StreamSummary, ApiError>
    where
        F: FnMut(WireEvent),
    {
        let response = self.send(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = FrameParser::default();
        let mut summary = StreamSummary::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(ApiError::Cancelled);
            }
            let chunk = chunk.map_err(|error| ApiError::Stream(error.to_string()))?;
            for event in parser.feed(&chunk) {
                if is_terminal(&event) {
                    summary.terminal_seen = true;
                }
                summary.events += 1;
                on_event(event);
                if is_cancelled(cancellation) {
                    return Err(ApiError::Cancelled);
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(ApiError::Cancelled);
        }
        if !parser.is_empty_buffer() {
            tracing::warn!("stream ended with an incomplete trailing frame");
        }

        summary.skipped_frames = parser.skipped_frames();
        Ok(summary)
    }

    pub async fn stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
    ) -> Result<Vec<WireEvent>, ApiError> {
        let mut events = Vec::new();
        self.stream_with_handler(request, cancellation, |event| events.push(event))
            .await?;
        Ok(events)
    }

    /// `GET <root>/threads/{id}`: ordered message records of a stored thread.
    pub async fn fetch_thread(
        &self,
        thread_id: &str,
        cancellation: Option<&CancelSignal>,
    ) -> Result<Vec<HistoryMessage>, ApiError> {
        let url = thread_url(&self.config.base_url, thread_id)?;
        let mut headers = self.build_headers()?;
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        let response = await_or_cancel(self.http.get(url).headers(headers).send(), cancellation)
            .await?
            .map_err(ApiError::from)?;
        let response = ensure_success(response, cancellation).await?;
        let body = await_or_cancel(response.bytes(), cancellation)
            .await?
            .map_err(ApiError::from)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn ensure_success(
    response: Response,
    cancellation: Option<&CancelSignal>,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = await_or_cancel(response.text(), cancellation)
        .await?
        .unwrap_or_default();
    Err(ApiError::Status(status, parse_error_message(status, &body)))
}

fn is_terminal(event: &WireEvent) -> bool {
    matches!(event, WireEvent::Chunk(chunk) if StreamChunk::is_terminal(chunk))
}

fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancelSignal>,
) -> Result<F::Output, ApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
