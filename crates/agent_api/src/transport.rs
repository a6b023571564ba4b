use agent_protocol::{
    CancelSignal, ChatRequest, ChatTransport, HistoryMessage, TransportError, WireEvent,
};

use crate::client::AgentApiClient;
use crate::config::AgentApiConfig;
use crate::error::ApiError;

/// Blocking [`ChatTransport`] over [`AgentApiClient`].
///
/// Each call drives the async client on a dedicated current-thread runtime, so
/// `emit` runs on the caller's thread between reads.
#[derive(Debug)]
pub struct HttpTransport {
    client: AgentApiClient,
}

impl HttpTransport {
    pub fn new(config: AgentApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: AgentApiClient::new(config)?,
        })
    }

    pub fn client(&self) -> &AgentApiClient {
        &self.client
    }

    fn runtime() -> Result<tokio::runtime::Runtime, ApiError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ApiError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })
    }
}

impl ChatTransport for HttpTransport {
    fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(WireEvent),
    ) -> Result<(), TransportError> {
        let runtime = Self::runtime()?;
        let summary = runtime.block_on(self.client.stream_with_handler(
            &request,
            Some(&cancel),
            |event| emit(event),
        ))?;

        tracing::debug!(
            events = summary.events,
            skipped = summary.skipped_frames,
            terminal = summary.terminal_seen,
            "stream reached end of input"
        );
        Ok(())
    }

    fn fetch_thread(&self, thread_id: &str) -> Result<Vec<HistoryMessage>, TransportError> {
        let runtime = Self::runtime()?;
        Ok(runtime.block_on(self.client.fetch_thread(thread_id, None))?)
    }
}
