//! Human-in-the-loop review of paused agent actions.
//!
//! An interrupt payload is parsed into an [`InterruptDescriptor`]; each action
//! gets a [`DecisionBuilder`] and a [`BatchCoordinator`] collects one decision
//! per action in order. A payload that cannot be reviewed degrades to
//! [`InterruptView::Generic`], which offers no decision submission.

mod batch;
mod descriptor;
mod draft;

use serde_json::Value;
use tracing::warn;

pub use crate::hitl::batch::{ActionStatus, BatchCoordinator};
pub use crate::hitl::descriptor::{ActionRequest, InterruptDescriptor, ReviewConfig};
pub use crate::hitl::draft::{DecisionBuilder, Draft};
use crate::error::InterruptShapeError;

#[derive(Debug, Clone, PartialEq)]
pub enum InterruptView {
    Review(BatchCoordinator),
    Generic {
        raw: Value,
        reason: InterruptShapeError,
    },
}

impl InterruptView {
    pub fn from_value(value: &Value) -> Self {
        let coordinator = InterruptDescriptor::parse(value)
            .and_then(|descriptor| BatchCoordinator::new(&descriptor));

        match coordinator {
            Ok(coordinator) => Self::Review(coordinator),
            Err(reason) => {
                warn!(%reason, "interrupt cannot be reviewed; showing generic view");
                Self::Generic {
                    raw: value.clone(),
                    reason,
                }
            }
        }
    }

    pub fn accepts_decisions(&self) -> bool {
        matches!(self, Self::Review(_))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn valid_payload_opens_review() {
        let view = InterruptView::from_value(&json!({
            "action_requests": [{"name": "run", "args": {"cmd": "ls"}}],
            "review_configs": [{"action_name": "run", "allowed_decisions": ["approve", "reject"]}]
        }));

        assert!(view.accepts_decisions());
        assert_matches!(view, InterruptView::Review(batch) if batch.len() == 1);
    }

    #[test]
    fn malformed_payload_degrades_to_generic_view() {
        let raw = json!({"question": "continue?"});
        let view = InterruptView::from_value(&raw);

        assert!(!view.accepts_decisions());
        assert_matches!(
            view,
            InterruptView::Generic {
                reason: InterruptShapeError::MissingField { field: "action_requests" },
                raw: generic_raw,
            } if generic_raw == raw
        );
    }
}
