//! In-process remote store

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use roadmap_core::{to_answer_key, QuestionId, TodoId};
use roadmap_sync::{
    AuthGrant, Credentials, NewTodo, Registration, RemoteStore, SessionToken, SessionUser,
    SurveyResponse, SyncError, TodoStatus, UserTodo,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// One call received by [`FakeRemote`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Login { email: String },
    Register { email: String },
    GetSurveyResponses,
    SubmitSurveyResponses { question_ids: Vec<QuestionId> },
    GetUserTodos,
    UpdateTodo { todo_id: TodoId, status: TodoStatus },
    AddTodo { todo_id: TodoId, step_id: u32, status: TodoStatus },
}

#[derive(Debug, Clone)]
struct Account {
    user: SessionUser,
    password: String,
}

/// Remote store backed by maps, with a call log and failure injection
///
/// Behaves like the real backend where the sync layer cares: unknown
/// tokens are rejected with 403, updating a todo with no record is a 404,
/// creating a todo is an upsert, and a batch of survey responses replaces
/// earlier answers to the same questions.
#[derive(Debug, Default)]
pub struct FakeRemote {
    accounts: DashMap<String, Account>,
    tokens: DashMap<String, u64>,
    responses: DashMap<u64, BTreeMap<QuestionId, String>>,
    todos: DashMap<(u64, TodoId), UserTodo>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<VecDeque<SyncError>>,
    latency: Mutex<Option<Duration>>,
    offline: AtomicBool,
    next_id: AtomicU64,
    next_token: AtomicU64,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account and return its user
    pub fn with_account(&self, username: &str, email: &str, password: &str) -> SessionUser {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = SessionUser {
            id,
            email: email.to_string(),
            username: username.to_string(),
            archetype: None,
            current_savings: 0.0,
        };
        self.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Issue a token for an existing user without going through login
    pub fn issue_token(&self, user_id: u64) -> SessionToken {
        let serial = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let raw = format!("token-{user_id}-{serial}");
        self.tokens.insert(raw.clone(), user_id);
        SessionToken::new(raw)
    }

    /// Invalidate every token, as if the signing key rotated
    pub fn revoke_all(&self) {
        self.tokens.clear();
    }

    pub fn seed_response(&self, user_id: u64, question_id: QuestionId, response: &str) {
        self.responses
            .entry(user_id)
            .or_default()
            .insert(question_id, response.to_string());
    }

    pub fn seed_todo(&self, user_id: u64, todo_id: TodoId, status: TodoStatus) {
        self.todos.insert(
            (user_id, todo_id),
            UserTodo {
                todo_id,
                step_id: None,
                status,
            },
        );
    }

    /// Stored status of a user's todo
    pub fn todo_status(&self, user_id: u64, todo_id: TodoId) -> Option<TodoStatus> {
        self.todos.get(&(user_id, todo_id)).map(|t| t.status)
    }

    /// Stored responses of a user, keyed by question id
    pub fn responses_for(&self, user_id: u64) -> BTreeMap<QuestionId, String> {
        self.responses
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Make every call fail with a network error until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next call with `error`; queued errors are used in order
    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().push_back(error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn enter(&self, call: RemoteCall) -> Result<(), SyncError> {
        self.calls.lock().push(call);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::NetworkFailure("connection refused".into()));
        }
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn authorize(&self, token: &SessionToken) -> Result<u64, SyncError> {
        self.tokens
            .get(token.as_str())
            .map(|id| *id)
            .ok_or_else(|| SyncError::from_status(403, "Invalid or expired token"))
    }

    fn grant(&self, user: SessionUser) -> AuthGrant {
        AuthGrant {
            token: self.issue_token(user.id),
            user,
        }
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, SyncError> {
        self.enter(RemoteCall::Login {
            email: credentials.email.clone(),
        })
        .await?;
        let user = self
            .accounts
            .get(&credentials.email)
            .filter(|a| a.password == credentials.password)
            .map(|a| a.user.clone())
            .ok_or_else(|| SyncError::from_status(401, "Invalid credentials"))?;
        Ok(self.grant(user))
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, SyncError> {
        self.enter(RemoteCall::Register {
            email: registration.email.clone(),
        })
        .await?;
        if self.accounts.contains_key(&registration.email) {
            return Err(SyncError::from_status(400, "User already exists"));
        }
        let user = self.with_account(
            &registration.username,
            &registration.email,
            &registration.password,
        );
        Ok(self.grant(user))
    }

    async fn get_survey_responses(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<SurveyResponse>, SyncError> {
        self.enter(RemoteCall::GetSurveyResponses).await?;
        let user_id = self.authorize(token)?;
        Ok(self
            .responses_for(user_id)
            .into_iter()
            .map(|(question_id, response)| SurveyResponse {
                question_id,
                response,
            })
            .collect())
    }

    async fn submit_survey_responses_batch(
        &self,
        token: &SessionToken,
        responses: &[SurveyResponse],
    ) -> Result<(), SyncError> {
        self.enter(RemoteCall::SubmitSurveyResponses {
            question_ids: responses.iter().map(|r| r.question_id).collect(),
        })
        .await?;
        let user_id = self.authorize(token)?;
        if let Some(bad) = responses.iter().find(|r| to_answer_key(r.question_id).is_none()) {
            return Err(SyncError::from_status(
                400,
                format!("unknown question {}", bad.question_id),
            ));
        }
        let mut stored = self.responses.entry(user_id).or_default();
        for r in responses {
            stored.insert(r.question_id, r.response.clone());
        }
        Ok(())
    }

    async fn get_user_todos(&self, token: &SessionToken) -> Result<Vec<UserTodo>, SyncError> {
        self.enter(RemoteCall::GetUserTodos).await?;
        let user_id = self.authorize(token)?;
        let mut todos: Vec<UserTodo> = self
            .todos
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        todos.sort_by_key(|t| t.todo_id);
        Ok(todos)
    }

    async fn update_todo(
        &self,
        token: &SessionToken,
        todo_id: TodoId,
        status: TodoStatus,
    ) -> Result<UserTodo, SyncError> {
        self.enter(RemoteCall::UpdateTodo { todo_id, status }).await?;
        let user_id = self.authorize(token)?;
        let mut todo = self
            .todos
            .get_mut(&(user_id, todo_id))
            .ok_or_else(|| SyncError::from_status(404, "Todo not found"))?;
        todo.status = status;
        Ok(todo.value().clone())
    }

    async fn add_todo(&self, token: &SessionToken, todo: &NewTodo) -> Result<UserTodo, SyncError> {
        self.enter(RemoteCall::AddTodo {
            todo_id: todo.todo_id,
            step_id: todo.step_id,
            status: todo.status,
        })
        .await?;
        let user_id = self.authorize(token)?;
        let record = UserTodo {
            todo_id: todo.todo_id,
            step_id: Some(todo.step_id),
            status: todo.status,
        };
        self.todos.insert((user_id, todo.todo_id), record.clone());
        Ok(record)
    }
}
