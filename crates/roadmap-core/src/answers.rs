//! Survey answers
//!
//! Five fixed fields, each either empty (unanswered) or one of a closed
//! option set. The field set is fixed: unknown keys are rejected both when
//! addressing a field by name and when deserializing a stored record.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five survey fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKey {
    /// Household income bracket
    Income,
    /// Down payment savings bracket
    Savings,
    /// How settled the target location is
    Location,
    /// Purchase horizon
    Timeline,
    /// Current housing situation
    Housing,
}

impl AnswerKey {
    /// All keys in question order
    pub const ALL: [AnswerKey; 5] = [
        AnswerKey::Income,
        AnswerKey::Savings,
        AnswerKey::Location,
        AnswerKey::Timeline,
        AnswerKey::Housing,
    ];

    /// Field name as stored and sent over the wire
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Savings => "savings",
            Self::Location => "location",
            Self::Timeline => "timeline",
            Self::Housing => "housing",
        }
    }

    /// Question shown to the user
    #[must_use]
    pub fn question(self) -> &'static str {
        match self {
            Self::Income => "What is your annual household income?",
            Self::Savings => "How much have you saved (or expect to save) for a down payment?",
            Self::Location => "Do you know where you'd like to buy a home?",
            Self::Timeline => "When are you hoping to buy your first home?",
            Self::Housing => "What best describes your current housing situation?",
        }
    }

    /// Closed option set for this key
    #[must_use]
    pub fn options(self) -> &'static [&'static str] {
        match self {
            Self::Income => &[
                "Under $50,000",
                "$50,000 - $100,000",
                "$100,000 - $150,000",
                "$150,000+",
            ],
            Self::Savings => &[
                "Less than $10,000",
                "$10,000 - $25,000",
                "$25,000 - $50,000",
                "$50,000+",
            ],
            Self::Location => &[
                "Yes — I have a specific city or neighborhood in mind",
                "I have a general area in mind",
                "Not sure yet",
            ],
            Self::Timeline => &[
                "Within the next 3 months",
                "3-6 months",
                "6-12 months",
                "More than a year from now",
            ],
            Self::Housing => &[
                "Renting",
                "Living with family or friends",
                "Own a home already (looking to buy again)",
                "Other",
            ],
        }
    }

    /// Check a value against the option set; empty means unanswered
    pub fn check(self, value: &str) -> Result<(), ModelError> {
        if value.is_empty() || self.options().contains(&value) {
            Ok(())
        } else {
            Err(ModelError::InvalidOption {
                key: self.as_str(),
                value: value.to_string(),
            })
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ModelError::UnknownAnswerKey(s.to_string()))
    }
}

/// The user's survey answers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurveyAnswers {
    /// Household income bracket
    #[serde(default)]
    pub income: String,
    /// Savings bracket
    #[serde(default)]
    pub savings: String,
    /// Location certainty
    #[serde(default)]
    pub location: String,
    /// Purchase horizon
    #[serde(default)]
    pub timeline: String,
    /// Housing situation
    #[serde(default)]
    pub housing: String,
}

impl SurveyAnswers {
    /// Create empty answers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field
    #[must_use]
    pub fn get(&self, key: AnswerKey) -> &str {
        match key {
            AnswerKey::Income => &self.income,
            AnswerKey::Savings => &self.savings,
            AnswerKey::Location => &self.location,
            AnswerKey::Timeline => &self.timeline,
            AnswerKey::Housing => &self.housing,
        }
    }

    /// Write a field after checking it against the option set
    pub fn set(&mut self, key: AnswerKey, value: impl Into<String>) -> Result<(), ModelError> {
        let value = value.into();
        key.check(&value)?;
        *self.slot(key) = value;
        Ok(())
    }

    /// Builder form of [`SurveyAnswers::set`]
    pub fn with(mut self, key: AnswerKey, value: impl Into<String>) -> Result<Self, ModelError> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Write a field addressed by name
    pub fn set_by_name(&mut self, name: &str, value: impl Into<String>) -> Result<(), ModelError> {
        self.set(name.parse()?, value)
    }

    /// Validate every field against its option set
    pub fn validate(&self) -> Result<(), ModelError> {
        AnswerKey::ALL
            .into_iter()
            .try_for_each(|key| key.check(self.get(key)))
    }

    /// Answered fields, in question order
    pub fn answered(&self) -> impl Iterator<Item = (AnswerKey, &str)> + '_ {
        AnswerKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .filter(|(_, value)| !value.trim().is_empty())
    }

    /// True when no field has been answered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answered().next().is_none()
    }

    /// True when all five fields have been answered
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answered().count() == AnswerKey::ALL.len()
    }

    fn slot(&mut self, key: AnswerKey) -> &mut String {
        match key {
            AnswerKey::Income => &mut self.income,
            AnswerKey::Savings => &mut self.savings,
            AnswerKey::Location => &mut self.location,
            AnswerKey::Timeline => &mut self.timeline,
            AnswerKey::Housing => &mut self.housing,
        }
    }
}
