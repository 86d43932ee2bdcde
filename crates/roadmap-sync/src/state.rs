//! Session state owned by the sync layer

use crate::remote::SessionUser;
use roadmap_core::{default_steps, roadmap, ProgressSnapshot, Step, StepView, SurveyAnswers};
use serde::Serialize;

/// Authoritative in-memory state
///
/// Callers only ever see clones of this; mutation goes through the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// A session token is held
    pub authenticated: bool,
    /// Account of the current session
    pub user: Option<SessionUser>,
    /// Survey answers
    pub answers: SurveyAnswers,
    /// Step tree with completion flags
    pub steps: Vec<Step>,
    /// Amount saved toward the goal
    pub saved_amount: f64,
    /// Timeline the user committed to
    pub committed_timeline: String,
    /// Survey has been completed at least once
    pub survey_completed: bool,
}

impl SessionState {
    /// Fresh anonymous state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived aggregates for the current state
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::compute(&self.answers, &self.steps)
    }

    /// Derived roadmap for the current state
    #[must_use]
    pub fn roadmap(&self) -> Vec<StepView> {
        roadmap(&self.steps)
    }

    /// Reset the progress fields, keeping session identity
    pub(crate) fn reset_progress(&mut self) {
        self.answers = SurveyAnswers::default();
        self.steps = default_steps();
        self.saved_amount = 0.0;
        self.committed_timeline.clear();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            authenticated: false,
            user: None,
            answers: SurveyAnswers::default(),
            steps: default_steps(),
            saved_amount: 0.0,
            committed_timeline: String::new(),
            survey_completed: false,
        }
    }
}
