//! Request and response bodies of the REST API

use roadmap_sync::{AuthGrant, SessionToken, SessionUser, SurveyResponse, TodoStatus, UserTodo};
use serde::{Deserialize, Serialize};

/// Body of every non-2xx response
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

/// Login and registration response
#[derive(Debug, Deserialize)]
pub(crate) struct AuthBody {
    pub(crate) token: String,
    pub(crate) user: SessionUser,
}

impl From<AuthBody> for AuthGrant {
    fn from(body: AuthBody) -> Self {
        AuthGrant {
            token: SessionToken::new(body.token),
            user: body.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchBody<'a> {
    pub(crate) responses: &'a [SurveyResponse],
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusBody {
    pub(crate) status: TodoStatus,
}

/// `{ "message": ..., "todo": {...} }` wrapper of todo writes
#[derive(Debug, Deserialize)]
pub(crate) struct TodoEnvelope {
    pub(crate) todo: UserTodo,
}

/// Acknowledgement with no payload of interest
#[derive(Debug, Deserialize)]
pub(crate) struct Ack {}
