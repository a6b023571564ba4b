use agent_protocol::{DecisionKind, TransportError};
use thiserror::Error;

/// Local decision-submit failure. Raised before any transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a rejection requires a non-empty reason")]
    MissingRejectReason,

    #[error("an edit requires a non-empty action name")]
    EmptyEditedAction,

    #[error("decision '{}' is not allowed for action '{action}'", kind.as_str())]
    DecisionNotAllowed { action: String, kind: DecisionKind },
}

/// The interrupt payload cannot drive per-action review.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterruptShapeError {
    #[error("interrupt payload is missing the '{field}' array")]
    MissingField { field: &'static str },

    #[error("interrupt payload field '{field}' is malformed: {message}")]
    Malformed { field: &'static str, message: String },

    #[error("interrupt payload contains no action requests")]
    NoActions,

    #[error("action request {index} ('{action}') has no matching review config")]
    UnmatchedAction { index: usize, action: String },

    #[error("review config for '{action}' allows no decisions")]
    NoAllowedDecisions { action: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("{addressed} of {total} actions have a decision; all are required")]
    Incomplete { addressed: usize, total: usize },

    #[error("action '{action}' does not allow approval")]
    ApproveAllUnavailable { action: String },

    #[error("action index {index} is out of range for {total} actions")]
    IndexOutOfRange { index: usize, total: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a stream is already active for this session")]
    StreamActive,

    #[error("no interrupt is pending for this session")]
    NoPendingInterrupt,

    #[error("expected {expected} decisions for the pending interrupt, got {actual}")]
    DecisionCountMismatch { expected: usize, actual: usize },

    #[error("pending interrupt cannot be reviewed: {0}")]
    InterruptShape(#[from] InterruptShapeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
