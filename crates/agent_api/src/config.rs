use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ApiError;
use crate::url::DEFAULT_BASE_URL;

pub const BASE_URL_ENV_VAR: &str = "AGENT_STREAM_BASE_URL";
pub const MODEL_ENV_VAR: &str = "AGENT_STREAM_MODEL";
pub const MAX_ITERATIONS_ENV_VAR: &str = "AGENT_STREAM_MAX_ITERATIONS";
pub const TIMEOUT_ENV_VAR: &str = "AGENT_STREAM_TIMEOUT_SEC";

pub const DEFAULT_MODEL: &str = "default";
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Transport configuration for agent API requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentApiConfig {
    /// Base URL of the agent service; the stream endpoint is derived from it.
    pub base_url: String,
    /// Model used when a request does not name one.
    pub model: String,
    /// Iteration cap used when a request does not carry one.
    pub max_iterations: u32,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl Default for AgentApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl AgentApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `AGENT_STREAM_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults; unparsable numbers fail.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(base_url) = read(BASE_URL_ENV_VAR) {
            config.base_url = base_url;
        }
        if let Some(model) = read(MODEL_ENV_VAR) {
            config.model = model;
        }
        if let Some(raw) = read(MAX_ITERATIONS_ENV_VAR) {
            config.max_iterations = parse_positive(MAX_ITERATIONS_ENV_VAR, &raw)?;
        }
        if let Some(raw) = read(TIMEOUT_ENV_VAR) {
            let seconds = parse_positive(TIMEOUT_ENV_VAR, &raw)?;
            config.timeout = Some(Duration::from_secs(u64::from(seconds)));
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u32, ApiError> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ApiError::InvalidConfig(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}
