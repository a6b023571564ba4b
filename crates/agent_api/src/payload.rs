use agent_protocol::ChatRequest;

use crate::config::AgentApiConfig;

/// Fills request fields the caller left blank with transport defaults.
///
/// An empty model name takes the configured model; a zero iteration cap takes
/// the configured cap. Resume requests pass through unchanged.
pub fn with_transport_defaults(request: &ChatRequest, config: &AgentApiConfig) -> ChatRequest {
    let mut payload = request.clone();
    if let ChatRequest::Message(message) = &mut payload {
        if message.model.trim().is_empty() {
            message.model = config.model.clone();
        }
        if message.max_iterations == 0 {
            message.max_iterations = config.max_iterations;
        }
    }
    payload
}
