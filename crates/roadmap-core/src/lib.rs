//! Roadmap Core - survey, checklist and progress model
//!
//! The pure half of the home-buying roadmap:
//! - Survey answers with closed option sets
//! - The static four-step checklist catalog
//! - Translation between frontend item codes and backend record ids
//! - Derived progress (archetype, savings goal, completion, active step)
//! - The step unlock policy behind the visual roadmap
//!
//! # Example
//!
//! ```rust
//! use roadmap_core::{default_steps, AnswerKey, ProgressSnapshot, SurveyAnswers};
//!
//! let answers = SurveyAnswers::new()
//!     .with(AnswerKey::Timeline, "3-6 months")
//!     .unwrap();
//! let snapshot = ProgressSnapshot::compute(&answers, &default_steps());
//! assert_eq!(snapshot.buyer_archetype.label(), "Searcher");
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod answers;
pub mod catalog;
pub mod derive;
pub mod error;
pub mod roadmap;
pub mod translate;
pub mod types;

// Re-exports for convenience
pub use answers::{AnswerKey, SurveyAnswers};
pub use catalog::{catalog_item_ids, default_steps};
pub use derive::{
    active_step_id, buyer_archetype, completion_percent, journey_complete, savings_goal,
    BuyerArchetype, ProgressSnapshot,
};
pub use error::ModelError;
pub use roadmap::{navigate, roadmap, step_status, StepStatus, StepView};
pub use translate::{
    lookup_backend_id, to_answer_key, to_backend_id, to_frontend_id, to_question_id, QuestionId,
    TodoId,
};
pub use types::{find_step, merge_completion, toggle_item, ChecklistItem, Step};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
