//! Core checklist types
//!
//! Steps are static: created from the catalog at startup and never added or
//! removed at runtime. Only `todos[].completed` mutates.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Checklist item inside a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Stable frontend identifier (e.g. `"2c"`)
    #[serde(rename = "id")]
    pub frontend_id: String,
    /// Display text
    pub text: String,
    /// Completion flag
    pub completed: bool,
}

impl ChecklistItem {
    /// Create an incomplete item
    #[inline]
    #[must_use]
    pub fn new(frontend_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            frontend_id: frontend_id.into(),
            text: text.into(),
            completed: false,
        }
    }
}

/// A roadmap step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the roadmap
    pub id: u32,
    /// Title
    pub title: String,
    /// One-line description
    pub description: String,
    /// Ordered tips
    pub tips: Vec<String>,
    /// Ordered checklist
    pub todos: Vec<ChecklistItem>,
}

impl Step {
    /// True when every todo is completed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.todos.iter().all(|t| t.completed)
    }

    /// Number of completed todos
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|t| t.completed).count()
    }

    /// Find a todo by frontend id
    #[must_use]
    pub fn item(&self, frontend_id: &str) -> Option<&ChecklistItem> {
        self.todos.iter().find(|t| t.frontend_id == frontend_id)
    }
}

/// Find a step by id
#[must_use]
pub fn find_step(steps: &[Step], step_id: u32) -> Option<&Step> {
    steps.iter().find(|s| s.id == step_id)
}

/// Flip a todo's completion flag and return the new value
pub fn toggle_item(steps: &mut [Step], step_id: u32, frontend_id: &str) -> Result<bool, ModelError> {
    let step = steps
        .iter_mut()
        .find(|s| s.id == step_id)
        .ok_or(ModelError::UnknownStep(step_id))?;
    let item = step
        .todos
        .iter_mut()
        .find(|t| t.frontend_id == frontend_id)
        .ok_or_else(|| ModelError::UnknownItem {
            step_id,
            item: frontend_id.to_string(),
        })?;
    item.completed = !item.completed;
    Ok(item.completed)
}

/// Copy completion flags from `source` onto `target`, matching by frontend id
///
/// Text, tips and ordering always come from `target`; items missing from
/// `source` keep their current flag.
pub fn merge_completion(target: &mut [Step], source: &[Step]) {
    for item in target.iter_mut().flat_map(|s| s.todos.iter_mut()) {
        if let Some(stored) = source
            .iter()
            .flat_map(|s| s.todos.iter())
            .find(|t| t.frontend_id == item.frontend_id)
        {
            item.completed = stored.completed;
        }
    }
}
