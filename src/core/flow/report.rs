use std::fmt;
use std::sync::Arc;

use crate::domain::command::{Flow, OwnerId};
use crate::domain::error::AtCliError;

/// Where a flow run is in its lifecycle. Steps are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AcquiringLease,
    ExecutingStep(usize),
    AwaitingResponses(usize),
    ReleasingLease,
    Completed,
    Failed,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Idle => write!(f, "idle"),
            FlowState::AcquiringLease => write!(f, "acquiring lease"),
            FlowState::ExecutingStep(step) => write!(f, "executing step {}", step),
            FlowState::AwaitingResponses(step) => write!(f, "awaiting responses for step {}", step),
            FlowState::ReleasingLease => write!(f, "releasing lease"),
            FlowState::Completed => write!(f, "completed"),
            FlowState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one flow run
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub owner: OwnerId,
    pub name: Option<String>,
    pub total_steps: usize,
    pub steps_completed: usize,
    pub state: FlowState,
    pub error: Option<Arc<AtCliError>>,
}

impl FlowReport {
    pub fn new(owner: OwnerId, flow: &Flow) -> Self {
        Self {
            owner,
            name: flow.name.clone(),
            total_steps: flow.steps.len(),
            steps_completed: 0,
            state: FlowState::Idle,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == FlowState::Completed
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flow '{}' {} ({}/{} steps)",
            self.name.as_deref().unwrap_or("anonymous"),
            self.state,
            self.steps_completed,
            self.total_steps
        )?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}
