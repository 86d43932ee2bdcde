//! Session transitions
//!
//! Startup hydration from the cache, login, registration and logout. Every
//! transition advances the session epoch so remote work started under the
//! previous identity can no longer write into state or cache.

use crate::cache::{CacheKey, LocalCache};
use crate::epoch::EpochGuard;
use crate::error::SyncError;
use crate::gateway::{persist, SyncGateway};
use crate::phase::{LocalReason, OpOutcome};
use crate::remote::{AuthGrant, Credentials, Registration, RemoteStore, SessionUser};
use crate::state::SessionState;
use roadmap_core::merge_completion;
use std::sync::Arc;

/// Result of pulling a user's remote progress
#[derive(Debug, Clone)]
pub struct ReloadReport {
    /// Outcome of the answers load
    pub answers: OpOutcome,
    /// Outcome of the checklist load
    pub checklist: OpOutcome,
    /// Survey flag after the reload
    pub survey_completed: bool,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Account now signed in
    pub user: SessionUser,
    /// Remote progress pulled after sign-in
    pub reload: ReloadReport,
}

/// Result of a successful registration
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    /// Account just created
    pub user: SessionUser,
    /// Outcome of pushing the anonymous answers
    pub submitted: OpOutcome,
}

impl SyncGateway {
    /// Build a gateway, hydrate it from the cache and, when a session was
    /// cached, pull remote progress
    pub async fn open(cache: Arc<dyn LocalCache>, remote: Arc<dyn RemoteStore>) -> Self {
        let gateway = Self::new(cache, remote);
        gateway.hydrate();
        if gateway.is_authenticated() {
            let (answers, checklist) = gateway.refresh().await;
            tracing::debug!(
                answers = answers.is_settled(),
                checklist = checklist.is_settled(),
                "startup refresh finished"
            );
        }
        gateway
    }

    /// Replace state with whatever the cache holds
    ///
    /// Unreadable entries are logged and skipped. Cached checklist flags are
    /// merged onto the static catalog by item id, so catalog text changes
    /// never come from the cache.
    pub fn hydrate(&self) {
        let cache = &self.inner.cache;
        let mut state = SessionState::default();
        let mut token = None;

        if let Some(grant) = readable(CacheKey::SessionToken, cache.load_session()) {
            state.authenticated = true;
            state.user = Some(grant.user);
            token = Some(grant.token);
        }
        if let Some(answers) = readable(CacheKey::Answers, cache.load_answers()) {
            state.answers = answers;
        }
        if let Some(stored) = readable(CacheKey::Steps, cache.load_steps()) {
            merge_completion(&mut state.steps, &stored);
        }
        if let Some(amount) = readable(CacheKey::SavedAmount, cache.load_saved_amount()) {
            state.saved_amount = amount;
        }
        if let Some(timeline) = readable(CacheKey::CommittedTimeline, cache.load_committed_timeline()) {
            state.committed_timeline = timeline;
        }
        state.survey_completed =
            readable(CacheKey::SurveyCompleted, cache.survey_completed().map(Some)).unwrap_or(false);

        let mut shared = self.inner.shared.lock();
        tracing::info!(authenticated = token.is_some(), "state hydrated from cache");
        shared.state = state;
        shared.token = token;
    }

    /// Run both remote loads concurrently
    pub async fn refresh(&self) -> (OpOutcome, OpOutcome) {
        tokio::join!(self.load_answers(), self.load_checklist())
    }

    /// Discard in-memory progress and pull it from the remote
    ///
    /// Saved amount and committed timeline have no remote copy; they are
    /// re-read from the cache once both loads are done.
    pub async fn reload_user_data(&self) -> Result<ReloadReport, SyncError> {
        let (_, guard) = self.session().ok_or(SyncError::NotAuthenticated)?;
        self.reload(&guard).await
    }

    /// Exchange credentials for a session and pull its progress
    ///
    /// Anonymous answers and checklist flags are discarded, not merged.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, SyncError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let grant = self.inner.remote.login(&credentials).await.map_err(|e| {
            tracing::warn!(error = %e, "login failed");
            e
        })?;
        tracing::info!(user_id = grant.user.id, "logged in");

        let guard = self.start_session(&grant, true);
        let reload = self.reload(&guard).await?;
        Ok(LoginOutcome {
            user: grant.user,
            reload,
        })
    }

    /// Create an account and carry the anonymous answers into it
    ///
    /// Errors only when the account cannot be created. A failed answer push
    /// comes back as [`OpOutcome::Failed`] in `submitted`; the account stays
    /// signed in and the push can be retried with `submit_answers`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterOutcome, SyncError> {
        let registration = Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let grant = self.inner.remote.register(&registration).await.map_err(|e| {
            tracing::warn!(error = %e, "registration failed");
            e
        })?;
        tracing::info!(user_id = grant.user.id, "registered");

        self.start_session(&grant, false);
        let answers = self.state().answers;
        let submitted = if answers.is_empty() {
            OpOutcome::LocalOnly(LocalReason::NothingToSend)
        } else {
            self.submit_answers(answers).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "answers not saved to new account");
                OpOutcome::Failed(e)
            })
        };
        Ok(RegisterOutcome {
            user: grant.user,
            submitted,
        })
    }

    /// Drop the session and wipe every cached key
    ///
    /// Remote calls still in flight resolve as stale and write nothing.
    pub fn logout(&self) -> Result<(), SyncError> {
        tracing::info!("logging out");
        self.reset_session(None).map(|_| ())
    }

    fn start_session(&self, grant: &AuthGrant, discard_local: bool) -> EpochGuard {
        let cache = &self.inner.cache;
        let mut shared = self.inner.shared.lock();
        self.inner.epoch.advance();

        shared.token = Some(grant.token.clone());
        shared.state.authenticated = true;
        shared.state.user = Some(grant.user.clone());
        if discard_local {
            shared.state.reset_progress();
            shared.state.survey_completed = false;
            for key in [CacheKey::Answers, CacheKey::Steps, CacheKey::SurveyCompleted] {
                persist(key, cache.remove(key));
            }
        }
        if let Err(e) = cache.save_session(grant) {
            tracing::warn!(error = %e, "failed to cache session");
        }
        self.inner.epoch.guard()
    }

    async fn reload(&self, guard: &EpochGuard) -> Result<ReloadReport, SyncError> {
        self.commit(guard, |state, _| {
            state.reset_progress();
            Ok(())
        })?;

        let (answers, checklist) = self.refresh().await;

        let survey_completed = self.commit(guard, |state, cache| {
            if let Some(amount) = readable(CacheKey::SavedAmount, cache.load_saved_amount()) {
                state.saved_amount = amount;
            }
            if let Some(timeline) =
                readable(CacheKey::CommittedTimeline, cache.load_committed_timeline())
            {
                state.committed_timeline = timeline;
            }
            if !state.answers.is_empty() {
                state.survey_completed = true;
                persist(CacheKey::SurveyCompleted, cache.set_survey_completed(true));
            }
            Ok(state.survey_completed)
        })?;

        Ok(ReloadReport {
            answers,
            checklist,
            survey_completed,
        })
    }
}

fn readable<T>(key: CacheKey, result: Result<Option<T>, SyncError>) -> Option<T> {
    result.unwrap_or_else(|e| {
        tracing::error!(%key, error = %e, "ignoring unreadable cache entry");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::remote::{MockRemoteStore, SessionToken};

    fn user() -> SessionUser {
        SessionUser {
            id: 7,
            email: "sam@example.com".into(),
            username: "sam".into(),
            archetype: None,
            current_savings: 0.0,
        }
    }

    #[test]
    fn hydrate_requires_both_token_and_user() {
        let backend = Arc::new(MemoryCache::new());
        backend.save(CacheKey::SessionToken, "t").unwrap();
        let gateway = SyncGateway::new(backend, Arc::new(MockRemoteStore::new()));
        gateway.hydrate();
        assert!(!gateway.is_authenticated());
    }

    #[test]
    fn hydrate_skips_corrupt_entries() {
        let backend = Arc::new(MemoryCache::new());
        backend.save(CacheKey::Steps, "{not json").unwrap();
        backend.save(CacheKey::CommittedTimeline, "3-6 months").unwrap();
        let gateway = SyncGateway::new(backend, Arc::new(MockRemoteStore::new()));
        gateway.hydrate();

        let state = gateway.state();
        assert_eq!(state.steps, roadmap_core::default_steps());
        assert_eq!(state.committed_timeline, "3-6 months");
    }

    #[tokio::test]
    async fn failed_login_leaves_state_alone() {
        let mut remote = MockRemoteStore::new();
        remote
            .expect_login()
            .times(1)
            .returning(|_| Err(SyncError::from_status(401, "Invalid credentials")));
        let gateway = SyncGateway::new(Arc::new(MemoryCache::new()), Arc::new(remote));
        gateway.set_committed_timeline("3-6 months");
        let epoch = gateway.epoch();

        assert!(gateway.login("sam@example.com", "nope").await.is_err());
        assert!(!gateway.is_authenticated());
        assert_eq!(gateway.state().committed_timeline, "3-6 months");
        assert_eq!(gateway.epoch(), epoch);
    }

    #[tokio::test]
    async fn register_without_answers_skips_submit() {
        let mut remote = MockRemoteStore::new();
        remote.expect_register().times(1).returning(|_| {
            Ok(AuthGrant {
                token: SessionToken::new("t"),
                user: user(),
            })
        });
        remote.expect_submit_survey_responses_batch().never();

        let gateway = SyncGateway::new(Arc::new(MemoryCache::new()), Arc::new(remote));
        let outcome = gateway.register("sam", "sam@example.com", "pw").await.unwrap();
        assert!(matches!(
            outcome.submitted,
            OpOutcome::LocalOnly(LocalReason::NothingToSend)
        ));
        assert!(gateway.is_authenticated());
        assert!(gateway.cache().load_session().unwrap().is_some());
    }

    #[tokio::test]
    async fn register_keeps_account_when_answer_push_fails() {
        let mut remote = MockRemoteStore::new();
        remote.expect_register().times(1).returning(|_| {
            Ok(AuthGrant {
                token: SessionToken::new("t"),
                user: user(),
            })
        });
        remote
            .expect_submit_survey_responses_batch()
            .times(1)
            .returning(|_, _| Err(SyncError::NetworkFailure("down".into())));

        let gateway = SyncGateway::new(Arc::new(MemoryCache::new()), Arc::new(remote));
        let mut answers = roadmap_core::SurveyAnswers::default();
        answers.set(roadmap_core::AnswerKey::Timeline, "3-6 months").unwrap();
        gateway.submit_answers(answers).await.unwrap();

        let outcome = gateway.register("sam", "sam@example.com", "pw").await.unwrap();
        assert_eq!(outcome.user, user());
        assert!(matches!(
            outcome.submitted.error(),
            Some(SyncError::NetworkFailure(m)) if m == "down"
        ));
        assert!(gateway.is_authenticated());
        assert!(gateway.cache().load_session().unwrap().is_some());
        assert_eq!(gateway.state().answers.get(roadmap_core::AnswerKey::Timeline), "3-6 months");
        assert_eq!(gateway.stats(crate::phase::Operation::SubmitAnswers).failed, 1);
    }

    #[tokio::test]
    async fn reload_requires_session() {
        let gateway = SyncGateway::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MockRemoteStore::new()),
        );
        assert!(matches!(
            gateway.reload_user_data().await,
            Err(SyncError::NotAuthenticated)
        ));
    }
}
