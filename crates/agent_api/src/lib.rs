//! HTTP transport for streamed agent conversations.
//!
//! This crate owns request building, `data: <json>` frame decoding, cooperative
//! cancellation and history fetches for the agent service. It holds no
//! conversation state; decoded events are handed to the caller one at a time.
//!
//! Interrupt frames (`{"type":"interrupt",..}` or `{"__interrupt__":[..]}`) are
//! surfaced as [`agent_protocol::WireEvent::Interrupt`] alongside the regular
//! stream chunks.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod transport;
pub mod url;

pub use client::{AgentApiClient, StreamSummary};
pub use config::AgentApiConfig;
pub use error::ApiError;
pub use sse::FrameParser;
pub use transport::HttpTransport;
pub use crate::url::{normalize_stream_url, thread_url};
