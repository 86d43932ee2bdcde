//! Error types for the roadmap model
//!
//! Covers the failures a caller can trigger against the static model:
//! - Unknown survey keys and out-of-set answer values
//! - Unknown steps or checklist items
//! - Navigation into a step that is still locked

/// Model-level error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Survey key outside the fixed field set
    #[error("unknown survey key: {0}")]
    UnknownAnswerKey(String),

    /// Answer value outside the closed option set for its key
    #[error("invalid option for {key}: {value:?}")]
    InvalidOption {
        /// Survey key
        key: &'static str,
        /// Rejected value
        value: String,
    },

    /// Step id not present in the catalog
    #[error("unknown step: {0}")]
    UnknownStep(u32),

    /// Checklist item not present in the given step
    #[error("unknown checklist item {item} in step {step_id}")]
    UnknownItem {
        /// Step the lookup targeted
        step_id: u32,
        /// Frontend item id
        item: String,
    },

    /// Step exists but is not yet unlocked
    #[error("step {0} is locked")]
    StepLocked(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_display() {
        let err = ModelError::InvalidOption {
            key: "income",
            value: "lots".to_string(),
        };
        assert_eq!(err.to_string(), "invalid option for income: \"lots\"");
        assert_eq!(ModelError::StepLocked(3).to_string(), "step 3 is locked");
    }
}
