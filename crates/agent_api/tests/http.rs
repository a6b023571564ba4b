use agent_api::{normalize_stream_url, AgentApiClient, AgentApiConfig};
use agent_protocol::{ChatRequest, Decision, MessageRequest, ResumeCommand, ResumeRequest};

fn message_request() -> ChatRequest {
    ChatRequest::Message(MessageRequest {
        message: "payload".into(),
        conversation_history: Vec::new(),
        model: String::new(),
        max_iterations: 0,
        thread_id: Some("thread-1".to_string()),
    })
}

#[test]
fn http_request_targets_stream_endpoint_with_post() {
    let config = AgentApiConfig::new("http://agent.local/api");
    let client = AgentApiClient::new(config).expect("client");

    let http_request = client
        .build_request(&message_request())
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(
        http_request.url().as_str(),
        normalize_stream_url("http://agent.local/api")
            .expect("url")
            .as_str()
    );
    assert_eq!(http_request.method(), "POST");
    assert_eq!(
        http_request.headers()["accept"],
        "text/event-stream"
    );
}

#[test]
fn http_request_body_carries_defaults_for_blank_fields() {
    let config = AgentApiConfig::new("http://agent.local")
        .with_model("m-1")
        .with_max_iterations(6);
    let client = AgentApiClient::new(config).expect("client");

    let http_request = client
        .build_request(&message_request())
        .expect("build request")
        .build()
        .expect("request");
    let body = http_request
        .body()
        .and_then(|body| body.as_bytes())
        .expect("json body should be buffered");
    let value: serde_json::Value = serde_json::from_slice(body).expect("json body");

    assert_eq!(value["message"], "payload");
    assert_eq!(value["model"], "m-1");
    assert_eq!(value["max_iterations"], 6);
    assert_eq!(value["thread_id"], "thread-1");
    assert_eq!(value["conversation_history"], serde_json::json!([]));
}

#[test]
fn resume_body_is_a_command_envelope() {
    let client = AgentApiClient::new(AgentApiConfig::default()).expect("client");
    let request = ChatRequest::Resume(ResumeRequest {
        command: ResumeCommand::new(vec![Decision::Approve, Decision::Approve]),
        thread_id: None,
    });

    let http_request = client
        .build_request(&request)
        .expect("build request")
        .build()
        .expect("request");
    let body = http_request
        .body()
        .and_then(|body| body.as_bytes())
        .expect("json body should be buffered");
    let value: serde_json::Value = serde_json::from_slice(body).expect("json body");

    assert_eq!(
        value,
        serde_json::json!({
            "command": {"resume": {"decisions": [{"type": "approve"}, {"type": "approve"}]}}
        })
    );
}

#[test]
fn client_rejects_unparsable_base_url() {
    let error = AgentApiClient::new(AgentApiConfig::new("::not-a-url"))
        .expect_err("invalid base URL should fail");
    assert!(error.to_string().contains("invalid base URL"));
}
