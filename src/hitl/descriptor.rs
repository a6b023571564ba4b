use agent_protocol::DecisionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::InterruptShapeError;

/// Action the paused agent wants reviewed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRequest {
    pub name: String,
    pub args: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewConfig {
    pub action_name: String,
    /// Allowed decision kinds, deduplicated, in wire order.
    pub allowed_decisions: Vec<DecisionKind>,
}

impl ReviewConfig {
    pub fn allows(&self, kind: DecisionKind) -> bool {
        self.allowed_decisions.contains(&kind)
    }
}

#[derive(Debug, Deserialize)]
struct WireActionRequest {
    name: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReviewConfig {
    action_name: String,
    #[serde(default)]
    allowed_decisions: Vec<String>,
}

/// Parsed HITL interrupt payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterruptDescriptor {
    pub action_requests: Vec<ActionRequest>,
    pub review_configs: Vec<ReviewConfig>,
}

impl InterruptDescriptor {
    /// Parses an interrupt payload. A payload still wrapped as `{"value": {...}}`
    /// is unwrapped first.
    pub fn parse(value: &Value) -> Result<Self, InterruptShapeError> {
        let body = match value.get("value") {
            Some(inner) if value.get("action_requests").is_none() => inner,
            _ => value,
        };

        let action_requests = required_array(body, "action_requests")?
            .iter()
            .map(parse_action_request)
            .collect::<Result<Vec<_>, _>>()?;
        let review_configs = required_array(body, "review_configs")?
            .iter()
            .map(parse_review_config)
            .collect::<Result<Vec<_>, _>>()?;

        if action_requests.is_empty() {
            return Err(InterruptShapeError::NoActions);
        }

        Ok(Self {
            action_requests,
            review_configs,
        })
    }

    /// Review config for action `index`: matched by name, else by position.
    pub fn review_config_for(&self, index: usize) -> Result<&ReviewConfig, InterruptShapeError> {
        let action = self
            .action_requests
            .get(index)
            .ok_or(InterruptShapeError::NoActions)?;

        self.review_configs
            .iter()
            .find(|config| config.action_name == action.name)
            .or_else(|| self.review_configs.get(index))
            .ok_or_else(|| InterruptShapeError::UnmatchedAction {
                index,
                action: action.name.clone(),
            })
    }

    /// Every action paired with its review config. Fails if any action is
    /// unmatched or allows nothing.
    pub fn reviewed_actions(
        &self,
    ) -> Result<Vec<(&ActionRequest, &ReviewConfig)>, InterruptShapeError> {
        self.action_requests
            .iter()
            .enumerate()
            .map(|(index, action)| {
                let config = self.review_config_for(index)?;
                if config.allowed_decisions.is_empty() {
                    return Err(InterruptShapeError::NoAllowedDecisions {
                        action: action.name.clone(),
                    });
                }
                Ok((action, config))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.action_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_requests.is_empty()
    }
}

fn required_array<'a>(
    body: &'a Value,
    field: &'static str,
) -> Result<&'a Vec<Value>, InterruptShapeError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(InterruptShapeError::MissingField { field }),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(InterruptShapeError::Malformed {
            field,
            message: "expected an array".to_string(),
        }),
    }
}

fn parse_action_request(value: &Value) -> Result<ActionRequest, InterruptShapeError> {
    let wire: WireActionRequest =
        serde_json::from_value(value.clone()).map_err(|error| InterruptShapeError::Malformed {
            field: "action_requests",
            message: error.to_string(),
        })?;

    let args = match wire.args {
        Value::Object(args) => args,
        Value::Null => Map::new(),
        _ => {
            return Err(InterruptShapeError::Malformed {
                field: "action_requests",
                message: format!("args of '{}' must be an object", wire.name),
            })
        }
    };

    Ok(ActionRequest {
        name: wire.name,
        args,
        description: wire.description,
    })
}

fn parse_review_config(value: &Value) -> Result<ReviewConfig, InterruptShapeError> {
    let wire: WireReviewConfig =
        serde_json::from_value(value.clone()).map_err(|error| InterruptShapeError::Malformed {
            field: "review_configs",
            message: error.to_string(),
        })?;

    let mut allowed_decisions = Vec::new();
    for raw in &wire.allowed_decisions {
        match DecisionKind::parse(raw) {
            Some(kind) if !allowed_decisions.contains(&kind) => allowed_decisions.push(kind),
            Some(_) => {}
            None => warn!(
                action = %wire.action_name,
                decision = %raw,
                "unknown decision kind ignored"
            ),
        }
    }

    Ok(ReviewConfig {
        action_name: wire.action_name,
        allowed_decisions,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_actions_and_configs() {
        let descriptor = InterruptDescriptor::parse(&json!({
            "action_requests": [
                {"name": "send_email", "args": {"to": "a@b.c"}, "description": "Send it"}
            ],
            "review_configs": [
                {
                    "action_name": "send_email",
                    "allowed_decisions": ["approve", "edit", "reject", "approve"]
                }
            ]
        }))
        .expect("descriptor");

        assert_eq!(descriptor.len(), 1);
        assert_eq!(descriptor.action_requests[0].args["to"], json!("a@b.c"));
        assert_eq!(
            descriptor.review_configs[0].allowed_decisions,
            vec![DecisionKind::Approve, DecisionKind::Edit, DecisionKind::Reject]
        );
    }

    #[test]
    fn wrapped_value_is_unwrapped() {
        let descriptor = InterruptDescriptor::parse(&json!({
            "value": {
                "action_requests": [{"name": "run", "args": {}}],
                "review_configs": [{"action_name": "run", "allowed_decisions": ["approve"]}]
            }
        }))
        .expect("descriptor");
        assert_eq!(descriptor.action_requests[0].name, "run");
    }

    #[test]
    fn missing_arrays_are_shape_errors() {
        assert_eq!(
            InterruptDescriptor::parse(&json!({"review_configs": []})),
            Err(InterruptShapeError::MissingField {
                field: "action_requests"
            })
        );
        assert_eq!(
            InterruptDescriptor::parse(&json!({"action_requests": [{"name": "run"}]})),
            Err(InterruptShapeError::MissingField {
                field: "review_configs"
            })
        );
        assert_matches!(
            InterruptDescriptor::parse(&json!({"action_requests": {}, "review_configs": []})),
            Err(InterruptShapeError::Malformed { field: "action_requests", .. })
        );
        assert_eq!(
            InterruptDescriptor::parse(&json!({"action_requests": [], "review_configs": []})),
            Err(InterruptShapeError::NoActions)
        );
    }

    #[test]
    fn non_object_args_are_rejected() {
        assert_matches!(
            InterruptDescriptor::parse(&json!({
                "action_requests": [{"name": "run", "args": [1, 2]}],
                "review_configs": []
            })),
            Err(InterruptShapeError::Malformed { .. })
        );
    }

    #[test]
    fn config_matching_prefers_name_then_position() {
        let descriptor = InterruptDescriptor::parse(&json!({
            "action_requests": [
                {"name": "write_file", "args": {}},
                {"name": "delete_file", "args": {}},
                {"name": "shell", "args": {}}
            ],
            "review_configs": [
                {"action_name": "delete_file", "allowed_decisions": ["reject"]},
                {"action_name": "something_else", "allowed_decisions": ["approve"]}
            ]
        }))
        .expect("descriptor");

        assert_eq!(
            descriptor.review_config_for(0).map(|config| config.action_name.as_str()),
            Ok("delete_file")
        );
        assert_eq!(
            descriptor.review_config_for(1).map(|config| config.action_name.as_str()),
            Ok("delete_file")
        );
        assert_eq!(
            descriptor.review_config_for(2),
            Err(InterruptShapeError::UnmatchedAction {
                index: 2,
                action: "shell".to_string(),
            })
        );
        assert_matches!(
            descriptor.reviewed_actions(),
            Err(InterruptShapeError::UnmatchedAction { index: 2, .. })
        );
    }

    #[test]
    fn config_with_no_known_decisions_is_invalid() {
        let descriptor = InterruptDescriptor::parse(&json!({
            "action_requests": [{"name": "run", "args": {}}],
            "review_configs": [{"action_name": "run", "allowed_decisions": ["respond"]}]
        }))
        .expect("descriptor");

        assert_eq!(
            descriptor.reviewed_actions(),
            Err(InterruptShapeError::NoAllowedDecisions {
                action: "run".to_string(),
            })
        );
    }
}
