use std::collections::BTreeMap;

use agent_protocol::{Decision, DecisionKind, ResumeCommand};

use crate::error::{BatchError, InterruptShapeError};
use crate::hitl::descriptor::InterruptDescriptor;
use crate::hitl::draft::DecisionBuilder;

/// Review status of one action, derived from the saved decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Unset,
    Approved,
    Rejected,
    Edited,
}

/// Per-action decision tracking for one interrupt with N actions.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCoordinator {
    builders: Vec<DecisionBuilder>,
    current_index: usize,
    addressed: BTreeMap<usize, Decision>,
}

impl BatchCoordinator {
    pub fn new(descriptor: &InterruptDescriptor) -> Result<Self, InterruptShapeError> {
        if descriptor.is_empty() {
            return Err(InterruptShapeError::NoActions);
        }
        let builders = descriptor
            .reviewed_actions()?
            .into_iter()
            .map(|(action, config)| DecisionBuilder::new(action.clone(), config))
            .collect();

        Ok(Self {
            builders,
            current_index: 0,
            addressed: BTreeMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> &DecisionBuilder {
        &self.builders[self.current_index]
    }

    pub fn current_mut(&mut self) -> &mut DecisionBuilder {
        &mut self.builders[self.current_index]
    }

    pub fn builder(&self, index: usize) -> Option<&DecisionBuilder> {
        self.builders.get(index)
    }

    pub fn builders(&self) -> &[DecisionBuilder] {
        &self.builders
    }

    pub fn go_to(&mut self, index: usize) -> Result<(), BatchError> {
        self.check_index(index)?;
        self.current_index = index;
        Ok(())
    }

    /// Builds and stores the decision for the current action, then advances
    /// unless the current action is the last one.
    pub fn save_decision(&mut self) -> Result<(), BatchError> {
        let decision = self.current().build()?;
        self.addressed.insert(self.current_index, decision);
        if self.current_index + 1 < self.builders.len() {
            self.current_index += 1;
        }
        Ok(())
    }

    pub fn decision(&self, index: usize) -> Option<&Decision> {
        self.addressed.get(&index)
    }

    pub fn addressed_count(&self) -> usize {
        self.addressed.len()
    }

    pub fn can_submit_all(&self) -> bool {
        self.addressed.len() == self.builders.len()
    }

    /// The saved decisions in action order. Requires a decision for every action.
    pub fn submit_all(&self) -> Result<ResumeCommand, BatchError> {
        if !self.can_submit_all() {
            return Err(BatchError::Incomplete {
                addressed: self.addressed.len(),
                total: self.builders.len(),
            });
        }
        Ok(ResumeCommand::new(self.addressed.values().cloned().collect()))
    }

    pub fn can_approve_all(&self) -> bool {
        self.builders.iter().all(DecisionBuilder::accept_allowed)
    }

    /// One approval per action, ignoring any drafts in progress.
    pub fn approve_all(&self) -> Result<ResumeCommand, BatchError> {
        if let Some(builder) = self.builders.iter().find(|builder| !builder.accept_allowed()) {
            return Err(BatchError::ApproveAllUnavailable {
                action: builder.action().name.clone(),
            });
        }
        Ok(ResumeCommand::new(vec![Decision::Approve; self.builders.len()]))
    }

    pub fn status(&self, index: usize) -> ActionStatus {
        match self.addressed.get(&index).map(Decision::kind) {
            None => ActionStatus::Unset,
            Some(DecisionKind::Approve) => ActionStatus::Approved,
            Some(DecisionKind::Reject) => ActionStatus::Rejected,
            Some(DecisionKind::Edit) => ActionStatus::Edited,
        }
    }

    fn check_index(&self, index: usize) -> Result<(), BatchError> {
        if index < self.builders.len() {
            return Ok(());
        }
        Err(BatchError::IndexOutOfRange {
            index,
            total: self.builders.len(),
        })
    }
}
