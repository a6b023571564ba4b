use std::fmt;

use agent_protocol::TransportError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum ApiError {
    InvalidBaseUrl(String),
    InvalidConfig(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Stream(String),
    Serde(JsonError),
    Cancelled,
    Runtime(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Nested { error: ErrorPayloadFields },
    Detail { detail: String },
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::InvalidConfig(message) => write!(f, "invalid configuration: {message}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Stream(message) => write!(f, "stream read failure: {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Runtime(message) => write!(f, "runtime failure: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl From<ApiError> for TransportError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Cancelled => Self::Cancelled,
            ApiError::Status(status, message) => Self::Status {
                status: status.as_u16(),
                message,
            },
            ApiError::Stream(message) => Self::Stream(message),
            other => Self::Request(other.to_string()),
        }
    }
}

/// Extracts a human-readable message from an error response body.
///
/// Accepts `{"error":{"message":..}}` and `{"detail":..}` bodies, falling back
/// to the raw body and then to the status reason phrase.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let explicit = match serde_json::from_str::<ErrorPayload>(body) {
        Ok(ErrorPayload::Nested { error }) => error.message,
        Ok(ErrorPayload::Detail { detail }) => Some(detail),
        Err(_) => None,
    };

    if let Some(message) = explicit.filter(|message| !message.trim().is_empty()) {
        return message;
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
