//! reqwest-backed remote store

use crate::wire::{Ack, AuthBody, BatchBody, ErrorBody, StatusBody, TodoEnvelope};
use async_trait::async_trait;
use roadmap_core::TodoId;
use roadmap_sync::{
    AuthGrant, Credentials, NewTodo, Registration, RemoteStore, SessionToken, SurveyResponse,
    SyncConfig, SyncError, TodoStatus, UserTodo,
};
use serde::de::DeserializeOwned;

/// Remote store speaking the roadmap REST API
///
/// Status codes are mapped onto [`SyncError`] with
/// [`SyncError::from_status`]; transport errors and timeouts become
/// `NetworkFailure`, bodies that do not decode become `ValidationFailure`.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base: String,
}

impl HttpRemoteStore {
    /// Build a client for `config.api_url` with the configured timeout
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::NetworkFailure(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base: config.api_root().to_string(),
        })
    }

    /// API root requests are sent to
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, SyncError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let url = response.url().path().to_string();

        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            };
            tracing::debug!(%url, status = status.as_u16(), %message, "request rejected");
            return Err(SyncError::from_status(status.as_u16(), message));
        }

        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|e| {
            SyncError::ValidationFailure(format!("unexpected response body from {url}: {e}"))
        })
    }
}

fn transport(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::NetworkFailure("request timed out".to_string())
    } else {
        SyncError::NetworkFailure(err.to_string())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, SyncError> {
        let request = self.client.post(self.url("/auth/login")).json(credentials);
        self.send::<AuthBody>(request).await.map(AuthGrant::from)
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, SyncError> {
        let request = self.client.post(self.url("/auth/register")).json(registration);
        self.send::<AuthBody>(request).await.map(AuthGrant::from)
    }

    async fn get_survey_responses(
        &self,
        token: &SessionToken,
    ) -> Result<Vec<SurveyResponse>, SyncError> {
        let request = self
            .client
            .get(self.url("/surveys/responses"))
            .bearer_auth(token.as_str());
        self.send(request).await
    }

    async fn submit_survey_responses_batch(
        &self,
        token: &SessionToken,
        responses: &[SurveyResponse],
    ) -> Result<(), SyncError> {
        let request = self
            .client
            .post(self.url("/surveys/responses/batch"))
            .bearer_auth(token.as_str())
            .json(&BatchBody { responses });
        self.send::<Ack>(request).await.map(|_| ())
    }

    async fn get_user_todos(&self, token: &SessionToken) -> Result<Vec<UserTodo>, SyncError> {
        let request = self.client.get(self.url("/todos")).bearer_auth(token.as_str());
        self.send(request).await
    }

    async fn update_todo(
        &self,
        token: &SessionToken,
        todo_id: TodoId,
        status: TodoStatus,
    ) -> Result<UserTodo, SyncError> {
        let request = self
            .client
            .put(self.url(&format!("/todos/{todo_id}")))
            .bearer_auth(token.as_str())
            .json(&StatusBody { status });
        self.send::<TodoEnvelope>(request).await.map(|e| e.todo)
    }

    async fn add_todo(&self, token: &SessionToken, todo: &NewTodo) -> Result<UserTodo, SyncError> {
        let request = self
            .client
            .post(self.url("/todos"))
            .bearer_auth(token.as_str())
            .json(todo);
        self.send::<TodoEnvelope>(request).await.map(|e| e.todo)
    }
}
