use std::collections::BTreeMap;

use crate::config::AgentApiConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for streaming requests.
pub fn build_headers(config: &AgentApiConfig) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

fn default_user_agent() -> String {
    format!(
        "agent-stream/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_sse_accept_and_json_content_type() {
        let headers = build_headers(&AgentApiConfig::default());
        assert_eq!(headers[HEADER_ACCEPT], "text/event-stream");
        assert_eq!(headers[HEADER_CONTENT_TYPE], "application/json");
        assert!(headers[HEADER_USER_AGENT].starts_with("agent-stream/"));
    }

    #[test]
    fn extra_headers_are_lowercased_and_override_defaults() {
        let config = AgentApiConfig::default()
            .with_user_agent("custom-ua")
            .insert_header("X-Trace-Id", " abc ")
            .insert_header("Accept", "application/x-ndjson");
        let headers = build_headers(&config);

        assert_eq!(headers[HEADER_USER_AGENT], "custom-ua");
        assert_eq!(headers["x-trace-id"], "abc");
        assert_eq!(headers[HEADER_ACCEPT], "application/x-ndjson");
    }
}
