//! Remote store interface and wire payloads
//!
//! Every payload is an explicit typed record. Implementations decode
//! responses into these shapes and report a `ValidationFailure` when the
//! body does not match, instead of trusting field presence.

use crate::error::SyncError;
use async_trait::async_trait;
use roadmap_core::{QuestionId, TodoId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque bearer credential
///
/// The sync layer only checks whether one is present; its contents are
/// never inspected.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token for the `Authorization` header
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Account details returned by login and registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Backend user id
    pub id: u64,
    /// Login email
    pub email: String,
    /// Display name
    pub username: String,
    /// Archetype stored server-side, if any
    #[serde(default)]
    pub archetype: Option<String>,
    /// Savings recorded server-side
    #[serde(default, deserialize_with = "decimal")]
    pub current_savings: f64,
}

/// Accepts a JSON number or a decimal string such as `"0.00"`
fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
        Null(()),
    }

    match Decimal::deserialize(deserializer)? {
        Decimal::Number(n) => Ok(n),
        Decimal::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Decimal::Null(()) => Ok(0.0),
    }
}

/// Token and user issued by a successful login or registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthGrant {
    /// Bearer credential
    pub token: SessionToken,
    /// Account details
    pub user: SessionUser,
}

/// Login request
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Login email
    pub email: String,
    /// Plain password, sent only over the transport
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Registration request
#[derive(Clone, Serialize)]
pub struct Registration {
    /// Display name
    pub username: String,
    /// Login email
    pub email: String,
    /// Plain password
    pub password: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// One answered survey question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    /// Backend question id
    pub question_id: QuestionId,
    /// Chosen option
    pub response: String,
}

/// Completion status as stored by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TodoStatus {
    /// Not done
    Pending,
    /// Done
    Completed,
}

impl TodoStatus {
    /// Status for a local completion flag
    #[inline]
    #[must_use]
    pub fn from_completed(completed: bool) -> Self {
        if completed {
            Self::Completed
        } else {
            Self::Pending
        }
    }

    /// Local completion flag for this status
    #[inline]
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A user's todo record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTodo {
    /// Backend todo id
    pub todo_id: TodoId,
    /// Step the record was filed under
    #[serde(default)]
    pub step_id: Option<u32>,
    /// Current status
    pub status: TodoStatus,
}

/// Create request for a todo record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    /// Backend todo id
    pub todo_id: TodoId,
    /// Owning step
    pub step_id: u32,
    /// Initial status
    pub status: TodoStatus,
}

/// RPC surface of the authoritative store
///
/// Creating a record that already exists must be idempotent on the remote
/// side: the toggle path may race two creates for the same todo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Exchange credentials for a session
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, SyncError>;

    /// Create an account and open a session
    async fn register(&self, registration: &Registration) -> Result<AuthGrant, SyncError>;

    /// Saved survey responses
    async fn get_survey_responses(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<SurveyResponse>, SyncError>;

    /// Upsert a batch of responses in one transaction
    async fn submit_survey_responses_batch(
        &self,
        token: &SessionToken,
        responses: &[SurveyResponse],
    ) -> Result<(), SyncError>;

    /// All todo records for the user
    async fn get_user_todos(&self, token: &SessionToken) -> Result<Vec<UserTodo>, SyncError>;

    /// Update a record's status; `RecordNotFound` if it does not exist yet
    async fn update_todo(
        &self,
        token: &SessionToken,
        todo_id: TodoId,
        status: TodoStatus,
    ) -> Result<UserTodo, SyncError>;

    /// Create a record
    async fn add_todo(&self, token: &SessionToken, todo: &NewTodo) -> Result<UserTodo, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_todo_decodes_server_shape() {
        let json = r#"{"userId":7,"todoId":4,"todoName":"Get pre-approved","stepId":2,
                       "reminderDate":null,"dueDate":null,"status":"Completed"}"#;
        let todo: UserTodo = serde_json::from_str(json).unwrap();
        assert_eq!(todo.todo_id, TodoId(4));
        assert_eq!(todo.step_id, Some(2));
        assert!(todo.status.is_completed());
    }

    #[test]
    fn user_accepts_decimal_string_savings() {
        let json = r#"{"id":3,"email":"a@b.c","username":"a","archetype":null,
                       "currentSavings":"1250.50","pushNotifications":true}"#;
        let user: SessionUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.current_savings, 1250.5);
        assert!(user.archetype.is_none());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = r#"{"todoId":4,"status":"Someday"}"#;
        assert!(serde_json::from_str::<UserTodo>(json).is_err());
    }

    #[test]
    fn secrets_stay_out_of_debug() {
        let creds = Credentials {
            email: "a@b.c".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{:?}", SessionToken::new("abc.def")).contains("abc"));
    }

    #[test]
    fn survey_response_wire_shape() {
        let r = SurveyResponse {
            question_id: QuestionId(4),
            response: "3-6 months".into(),
        };
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"questionId":4,"response":"3-6 months"}"#
        );
    }
}
