//! Roadmap step statuses and the unlock policy
//!
//! No per-step state is stored. Every status is derived from the todo flags
//! and the active step pointer, so any toggle re-derives the whole roadmap.

use crate::derive::active_step_id;
use crate::error::ModelError;
use crate::types::{find_step, Step};
use serde::{Deserialize, Serialize};

/// Visual state of a step on the roadmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Every todo done
    Complete,
    /// Unlocked and in progress
    Active,
    /// Not reachable yet
    Locked,
}

impl StepStatus {
    /// Whether the step can be opened
    #[inline]
    #[must_use]
    pub fn is_navigable(self) -> bool {
        !matches!(self, Self::Locked)
    }
}

/// One roadmap entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    /// Step id
    pub id: u32,
    /// Step title
    pub title: String,
    /// Derived status
    pub status: StepStatus,
    /// Completed todos in this step
    pub completed: usize,
    /// Total todos in this step
    pub total: usize,
}

/// Status of a single step given the current active pointer
#[must_use]
pub fn step_status(step: &Step, active_id: Option<u32>) -> StepStatus {
    if step.is_complete() {
        StepStatus::Complete
    } else if active_id.is_some_and(|active| step.id <= active) {
        StepStatus::Active
    } else {
        StepStatus::Locked
    }
}

/// Derive the full roadmap
#[must_use]
pub fn roadmap(steps: &[Step]) -> Vec<StepView> {
    let active = active_step_id(steps);
    steps
        .iter()
        .map(|step| StepView {
            id: step.id,
            title: step.title.clone(),
            status: step_status(step, active),
            completed: step.completed_count(),
            total: step.todos.len(),
        })
        .collect()
}

/// Open a step, rejecting locked or unknown ids
pub fn navigate(steps: &[Step], step_id: u32) -> Result<&Step, ModelError> {
    let step = find_step(steps, step_id).ok_or(ModelError::UnknownStep(step_id))?;
    if step_status(step, active_step_id(steps)).is_navigable() {
        Ok(step)
    } else {
        Err(ModelError::StepLocked(step_id))
    }
}
