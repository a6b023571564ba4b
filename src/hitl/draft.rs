use agent_protocol::{Decision, DecisionKind, EditedAction};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::hitl::descriptor::{ActionRequest, ReviewConfig};

/// Candidate response for one allowed decision kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Edit {
        edited_action: EditedAction,
        /// Approval is also allowed, so an untouched edit submits as approve.
        accept_allowed: bool,
        edits_made: bool,
    },
    Approve,
    Reject {
        message: String,
    },
}

impl Draft {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Edit { .. } => DecisionKind::Edit,
            Self::Approve => DecisionKind::Approve,
            Self::Reject { .. } => DecisionKind::Reject,
        }
    }
}

/// Builds the decision for a single reviewed action.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionBuilder {
    action: ActionRequest,
    allowed: Vec<DecisionKind>,
    edited_args: Map<String, Value>,
    feedback: String,
    selected: DecisionKind,
    edits_made: bool,
}

impl DecisionBuilder {
    /// `config` must allow at least one decision kind.
    pub fn new(action: ActionRequest, config: &ReviewConfig) -> Self {
        let allowed = config.allowed_decisions.clone();
        let edited_args = action.args.clone();
        let selected = default_selection(&allowed);

        Self {
            action,
            allowed,
            edited_args,
            feedback: String::new(),
            selected,
            edits_made: false,
        }
    }

    pub fn action(&self) -> &ActionRequest {
        &self.action
    }

    pub fn allows(&self, kind: DecisionKind) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn accept_allowed(&self) -> bool {
        self.allows(DecisionKind::Approve)
    }

    pub fn selected(&self) -> DecisionKind {
        self.selected
    }

    pub fn edits_made(&self) -> bool {
        self.edits_made
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn edited_args(&self) -> &Map<String, Value> {
        &self.edited_args
    }

    /// Drafts for the allowed kinds, ordered edit, approve, reject.
    pub fn drafts(&self) -> Vec<Draft> {
        [DecisionKind::Edit, DecisionKind::Approve, DecisionKind::Reject]
            .into_iter()
            .filter(|kind| self.allows(*kind))
            .map(|kind| match kind {
                DecisionKind::Edit => Draft::Edit {
                    edited_action: self.edited_action(),
                    accept_allowed: self.accept_allowed(),
                    edits_made: self.edits_made,
                },
                DecisionKind::Approve => Draft::Approve,
                DecisionKind::Reject => Draft::Reject {
                    message: self.feedback.clone(),
                },
            })
            .collect()
    }

    pub fn select(&mut self, kind: DecisionKind) -> Result<(), ValidationError> {
        self.ensure_allowed(kind)?;
        self.selected = kind;
        Ok(())
    }

    /// Sets one argument of the edited action and recomputes `edits_made`.
    pub fn edit_field(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), ValidationError> {
        self.ensure_allowed(DecisionKind::Edit)?;
        self.edited_args.insert(key.into(), value);
        self.refresh_edits();
        Ok(())
    }

    /// Restores the original arguments.
    pub fn reset_edits(&mut self) -> Result<(), ValidationError> {
        self.ensure_allowed(DecisionKind::Edit)?;
        self.edited_args = self.action.args.clone();
        self.refresh_edits();
        Ok(())
    }

    /// Keys whose string-normalized value differs from the original, sorted.
    pub fn changed_fields(&self) -> Vec<String> {
        let original = &self.action.args;
        let mut keys: Vec<String> = original
            .keys()
            .chain(self.edited_args.keys())
            .filter(|key| {
                original.get(*key).map(normalize) != self.edited_args.get(*key).map(normalize)
            })
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Stores reviewer feedback. Non-empty feedback selects reject; clearing it
    /// falls back to edit when edits exist, else to the default selection.
    pub fn set_feedback(&mut self, text: impl Into<String>) -> Result<(), ValidationError> {
        self.ensure_allowed(DecisionKind::Reject)?;
        self.feedback = text.into();

        if !self.feedback.trim().is_empty() {
            self.selected = DecisionKind::Reject;
        } else if self.edits_made {
            self.selected = DecisionKind::Edit;
        } else {
            self.selected = default_selection(&self.allowed);
        }
        Ok(())
    }

    /// Serializes the selected draft. Fails locally on an invalid draft.
    pub fn build(&self) -> Result<Decision, ValidationError> {
        self.ensure_allowed(self.selected)?;
        match self.selected {
            DecisionKind::Approve => Ok(Decision::Approve),
            DecisionKind::Reject => {
                let message = self.feedback.trim();
                if message.is_empty() {
                    return Err(ValidationError::MissingRejectReason);
                }
                Ok(Decision::Reject {
                    message: message.to_string(),
                })
            }
            DecisionKind::Edit => {
                if self.action.name.trim().is_empty() {
                    return Err(ValidationError::EmptyEditedAction);
                }
                if self.accept_allowed() && !self.edits_made {
                    return Ok(Decision::Approve);
                }
                Ok(Decision::Edit {
                    edited_action: self.edited_action(),
                })
            }
        }
    }

    fn edited_action(&self) -> EditedAction {
        EditedAction {
            name: self.action.name.clone(),
            args: Value::Object(self.edited_args.clone()),
        }
    }

    /// Selects edit while a diff exists. When the diff empties again the
    /// selection reverts; otherwise it is left alone.
    fn refresh_edits(&mut self) {
        let had_edits = self.edits_made;
        self.edits_made = !self.changed_fields().is_empty();

        if self.edits_made {
            self.selected = DecisionKind::Edit;
        } else if had_edits {
            self.selected = if self.accept_allowed() {
                DecisionKind::Approve
            } else if self.allows(DecisionKind::Reject) && !self.feedback.trim().is_empty() {
                DecisionKind::Reject
            } else {
                DecisionKind::Edit
            };
        }
    }

    fn ensure_allowed(&self, kind: DecisionKind) -> Result<(), ValidationError> {
        if self.allows(kind) {
            return Ok(());
        }
        Err(ValidationError::DecisionNotAllowed {
            action: self.action.name.clone(),
            kind,
        })
    }
}

fn default_selection(allowed: &[DecisionKind]) -> DecisionKind {
    [DecisionKind::Approve, DecisionKind::Reject, DecisionKind::Edit]
        .into_iter()
        .find(|kind| allowed.contains(kind))
        .unwrap_or(DecisionKind::Approve)
}

/// Strings compare as-is, numbers by their decimal text, everything else by
/// its JSON serialization.
fn normalize(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
