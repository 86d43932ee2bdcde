//! Identifier translation between the frontend and backend id spaces
//!
//! Checklist items are named by short codes in the UI (`"1a"`) while the
//! backend keys them by numeric todo id. Survey fields map to numeric
//! question ids. Both tables are fixed bijections.

use crate::answers::AnswerKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend todo record id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(pub u32);

impl TodoId {
    /// Sentinel returned for frontend ids with no backend record
    pub const UNMAPPED: TodoId = TodoId(0);

    /// True for the sentinel
    #[inline]
    #[must_use]
    pub fn is_unmapped(self) -> bool {
        self == Self::UNMAPPED
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend survey question id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u32);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const TODO_IDS: [(&str, u32); 18] = [
    ("1a", 3),
    ("1b", 6),
    ("1c", 7),
    ("1d", 8),
    ("2a", 9),
    ("2b", 10),
    ("2c", 4),
    ("2d", 11),
    ("3a", 1),
    ("3b", 12),
    ("3c", 13),
    ("3d", 14),
    ("3e", 5),
    ("4a", 15),
    ("4b", 16),
    ("4c", 17),
    ("4d", 18),
    ("4e", 19),
];

/// Backend id for a frontend item, or [`TodoId::UNMAPPED`]
#[must_use]
pub fn to_backend_id(frontend_id: &str) -> TodoId {
    lookup_backend_id(frontend_id).unwrap_or(TodoId::UNMAPPED)
}

/// Backend id for a frontend item, if mapped
#[must_use]
pub fn lookup_backend_id(frontend_id: &str) -> Option<TodoId> {
    TODO_IDS
        .iter()
        .find(|(code, _)| *code == frontend_id)
        .map(|(_, id)| TodoId(*id))
}

/// Frontend code for a backend todo id
#[must_use]
pub fn to_frontend_id(todo_id: TodoId) -> Option<&'static str> {
    TODO_IDS
        .iter()
        .find(|(_, id)| *id == todo_id.0)
        .map(|(code, _)| *code)
}

/// Question id for a survey field
#[must_use]
pub fn to_question_id(key: AnswerKey) -> QuestionId {
    match key {
        AnswerKey::Income => QuestionId(1),
        AnswerKey::Savings => QuestionId(2),
        AnswerKey::Location => QuestionId(3),
        AnswerKey::Timeline => QuestionId(4),
        AnswerKey::Housing => QuestionId(5),
    }
}

/// Survey field for a question id
#[must_use]
pub fn to_answer_key(question_id: QuestionId) -> Option<AnswerKey> {
    AnswerKey::ALL
        .into_iter()
        .find(|key| to_question_id(*key) == question_id)
}
