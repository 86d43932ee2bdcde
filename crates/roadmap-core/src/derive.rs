//! Derived progress state
//!
//! Pure functions over answers and steps. Nothing here is cached: callers
//! recompute on every read so a snapshot can never go stale against its
//! inputs.

use crate::answers::SurveyAnswers;
use crate::types::Step;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Buying-readiness label derived from the timeline answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuyerArchetype {
    /// Buying within three months
    #[serde(rename = "Ready Buyer")]
    ReadyBuyer,
    /// Three to six months out
    Searcher,
    /// Six to twelve months out
    Planner,
    /// Unanswered or further out
    Explorer,
}

impl BuyerArchetype {
    /// Display label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ReadyBuyer => "Ready Buyer",
            Self::Searcher => "Searcher",
            Self::Planner => "Planner",
            Self::Explorer => "Explorer",
        }
    }
}

impl fmt::Display for BuyerArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify the user from `answers.timeline` alone
#[must_use]
pub fn buyer_archetype(answers: &SurveyAnswers) -> BuyerArchetype {
    match answers.timeline.as_str() {
        "Within the next 3 months" => BuyerArchetype::ReadyBuyer,
        "3-6 months" => BuyerArchetype::Searcher,
        "6-12 months" => BuyerArchetype::Planner,
        _ => BuyerArchetype::Explorer,
    }
}

/// Down payment goal for an income bracket
#[must_use]
pub fn savings_goal(income: &str) -> u32 {
    match income {
        "Under $50,000" => 50_000,
        "$50,000 - $100,000" => 80_000,
        "$100,000 - $150,000" => 100_000,
        _ => 120_000,
    }
}

/// Percentage of completed todos across all steps, rounded half up
///
/// Zero when there are no todos.
#[must_use]
pub fn completion_percent(steps: &[Step]) -> u8 {
    let total = steps.iter().map(|s| s.todos.len()).sum::<usize>();
    if total == 0 {
        return 0;
    }
    let done = steps.iter().map(Step::completed_count).sum::<usize>();
    // round(100 * done / total) without floats
    let percent = (200 * done + total) / (2 * total);
    u8::try_from(percent).unwrap_or(100)
}

/// Id of the first step with an incomplete todo
///
/// When every step is complete this is the id of the last step; use
/// [`journey_complete`] to tell that terminal case apart. `None` only for an
/// empty step list.
#[must_use]
pub fn active_step_id(steps: &[Step]) -> Option<u32> {
    steps
        .iter()
        .find(|s| !s.is_complete())
        .or_else(|| steps.last())
        .map(|s| s.id)
}

/// True when there is at least one step and every todo is completed
#[must_use]
pub fn journey_complete(steps: &[Step]) -> bool {
    !steps.is_empty() && steps.iter().all(Step::is_complete)
}

/// View-level aggregates, recomputed on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Archetype from the timeline answer
    pub buyer_archetype: BuyerArchetype,
    /// Savings goal from the income answer
    pub savings_goal: u32,
    /// Overall checklist completion
    pub completion_percent: u8,
    /// Current step pointer (1-based)
    pub active_step_id: Option<u32>,
    /// Every todo in every step is done
    pub journey_complete: bool,
}

impl ProgressSnapshot {
    /// Compute a snapshot from current state
    #[must_use]
    pub fn compute(answers: &SurveyAnswers, steps: &[Step]) -> Self {
        Self {
            buyer_archetype: buyer_archetype(answers),
            savings_goal: savings_goal(&answers.income),
            completion_percent: completion_percent(steps),
            active_step_id: active_step_id(steps),
            journey_complete: journey_complete(steps),
        }
    }
}
