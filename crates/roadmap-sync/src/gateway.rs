//! Remote sync gateway
//!
//! Owns the session state, the local cache and the remote store. Every
//! mutation lands in memory and in the cache first; the remote is then
//! tried on a best-effort basis:
//! - Reads that fail leave whatever the cache last held
//! - Writes that fail keep the optimistic local value
//! - Only answer submission reports a remote failure to the caller
//!
//! The state lock is never held across an `.await`. Results of remote calls
//! are applied under the lock and only if the session epoch they started
//! under is still current.

use crate::cache::{LocalCache, ProgressCache};
use crate::epoch::{EpochGuard, SessionEpoch};
use crate::error::SyncError;
use crate::phase::{LocalReason, OpOutcome, OpPhase, OpStats, Operation, PhaseBook, RunId};
use crate::remote::{NewTodo, RemoteStore, SessionToken, SurveyResponse, TodoStatus, UserTodo};
use crate::state::SessionState;
use parking_lot::Mutex;
use roadmap_core::{
    lookup_backend_id, navigate, to_answer_key, to_backend_id, to_frontend_id, to_question_id,
    ModelError, ProgressSnapshot, Step, StepView, SurveyAnswers, TodoId,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(crate) struct Shared {
    pub(crate) state: SessionState,
    pub(crate) token: Option<SessionToken>,
}

pub(crate) struct Inner {
    pub(crate) shared: Mutex<Shared>,
    pub(crate) cache: ProgressCache,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) epoch: SessionEpoch,
    book: Mutex<PhaseBook>,
}

/// Entry point for every progress mutation and read
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SyncGateway {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for SyncGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncGateway")
            .field("authenticated", &self.is_authenticated())
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

impl SyncGateway {
    /// Create a gateway with default anonymous state
    ///
    /// Nothing is read from the cache; see `hydrate` and `open`.
    #[must_use]
    pub fn new(cache: Arc<dyn LocalCache>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: SessionState::default(),
                    token: None,
                }),
                cache: ProgressCache::new(cache),
                remote,
                epoch: SessionEpoch::new(),
                book: Mutex::new(PhaseBook::default()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Read projection
    // ------------------------------------------------------------------

    /// Copy of the current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.shared.lock().state.clone()
    }

    /// Derived aggregates, recomputed now
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.shared.lock().state.snapshot()
    }

    /// Derived roadmap, recomputed now
    #[must_use]
    pub fn roadmap(&self) -> Vec<StepView> {
        self.inner.shared.lock().state.roadmap()
    }

    /// Open a step, rejecting locked ones
    pub fn open_step(&self, step_id: u32) -> Result<Step, ModelError> {
        let shared = self.inner.shared.lock();
        navigate(&shared.state.steps, step_id).cloned()
    }

    /// A session token is held
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.shared.lock().token.is_some()
    }

    /// Current session epoch
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.current()
    }

    /// The typed cache this gateway writes through
    #[must_use]
    pub fn cache(&self) -> &ProgressCache {
        &self.inner.cache
    }

    /// Counters for one operation
    #[must_use]
    pub fn stats(&self, op: Operation) -> OpStats {
        self.inner.book.lock().get(op)
    }

    // ------------------------------------------------------------------
    // Remote-backed operations
    // ------------------------------------------------------------------

    /// Pull survey responses into state and cache
    ///
    /// An empty response set leaves local answers untouched.
    pub async fn load_answers(&self) -> OpOutcome {
        let op = Operation::LoadAnswers;
        let Some((token, guard)) = self.session() else {
            return self.local_only(op, LocalReason::Anonymous);
        };
        let run = self.begin(op);

        let applied = guard
            .run(self.inner.remote.get_survey_responses(&token))
            .await
            .and_then(|responses| answers_from_responses(&responses))
            .and_then(|answers| {
                self.commit(&guard, |state, cache| {
                    if let Some(answers) = answers {
                        persist(op, cache.save_answers(&answers));
                        state.answers = answers;
                    }
                    Ok(())
                })
            });

        match applied {
            Ok(()) => self.settle(run),
            Err(e) => self.fail(run, &guard, e),
        }
    }

    /// Pull todo completion into state and cache
    ///
    /// Items with no remote record are marked incomplete.
    pub async fn load_checklist(&self) -> OpOutcome {
        let op = Operation::LoadChecklist;
        let Some((token, guard)) = self.session() else {
            return self.local_only(op, LocalReason::Anonymous);
        };
        let run = self.begin(op);

        let applied = guard
            .run(self.inner.remote.get_user_todos(&token))
            .await
            .map(|todos| completion_map(&todos))
            .and_then(|done| {
                self.commit(&guard, |state, cache| {
                    apply_completion(&mut state.steps, &done)?;
                    persist(op, cache.save_steps(&state.steps));
                    Ok(())
                })
            });

        match applied {
            Ok(()) => self.settle(run),
            Err(e) => self.fail(run, &guard, e),
        }
    }

    /// Commit answers locally, then push the answered fields in one batch
    ///
    /// The local commit is never rolled back. A remote failure is returned
    /// so the caller can offer a retry.
    pub async fn submit_answers(&self, answers: SurveyAnswers) -> Result<OpOutcome, SyncError> {
        let op = Operation::SubmitAnswers;
        answers.validate()?;

        let session = {
            let mut shared = self.inner.shared.lock();
            persist(op, self.inner.cache.save_answers(&answers));
            if answers.is_complete() {
                shared.state.survey_completed = true;
                persist(op, self.inner.cache.set_survey_completed(true));
            }
            shared.state.answers = answers.clone();
            shared
                .token
                .clone()
                .map(|token| (token, self.inner.epoch.guard()))
        };

        let Some((token, guard)) = session else {
            return Ok(self.local_only(op, LocalReason::Anonymous));
        };
        let responses = answers_to_responses(&answers);
        if responses.is_empty() {
            return Ok(self.local_only(op, LocalReason::NothingToSend));
        }
        let run = self.begin(op);

        match guard
            .run(
                self.inner
                    .remote
                    .submit_survey_responses_batch(&token, &responses),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(count = responses.len(), "survey responses saved");
                Ok(self.settle(run))
            }
            Err(e) => {
                self.fail(run, &guard, e.clone());
                Err(e)
            }
        }
    }

    /// Flip a checklist item
    ///
    /// The local flip and cache write happen before this returns. The
    /// remote write, if any, runs on its own task; the returned handle can
    /// be awaited for its outcome or dropped.
    pub async fn toggle_item(&self, step_id: u32, frontend_id: &str) -> Result<ToggleHandle, SyncError> {
        let op = Operation::ToggleItem;
        let (completed, session) = {
            let mut shared = self.inner.shared.lock();
            let completed = roadmap_core::toggle_item(&mut shared.state.steps, step_id, frontend_id)?;
            persist(op, self.inner.cache.save_steps(&shared.state.steps));
            let session = shared
                .token
                .clone()
                .map(|token| (token, self.inner.epoch.guard()));
            (completed, session)
        };
        tracing::debug!(step_id, item = frontend_id, completed, "checklist item toggled");

        let Some((token, guard)) = session else {
            return Ok(ToggleHandle::local(completed, self.local_only(op, LocalReason::Anonymous)));
        };

        let todo_id = to_backend_id(frontend_id);
        if todo_id.is_unmapped() {
            tracing::error!(item = frontend_id, step_id, "no backend id for checklist item; remote write skipped");
            let reason = LocalReason::UnmappedItem(frontend_id.to_string());
            return Ok(ToggleHandle::local(completed, self.local_only(op, reason)));
        }

        let run = self.begin(op);
        let this = self.clone();
        let task = tokio::spawn(async move {
            this.push_toggle(run, guard, token, step_id, todo_id, completed)
                .await
        });
        Ok(ToggleHandle {
            completed,
            write: RemoteWrite::Pending(task),
        })
    }

    // ------------------------------------------------------------------
    // Local-only fields
    // ------------------------------------------------------------------

    /// Record the amount saved so far
    pub fn set_saved_amount(&self, amount: f64) -> Result<(), SyncError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(SyncError::ValidationFailure(format!(
                "saved amount must be a non-negative number, got {amount}"
            )));
        }
        let mut shared = self.inner.shared.lock();
        shared.state.saved_amount = amount;
        if let Err(e) = self.inner.cache.save_saved_amount(amount) {
            tracing::warn!(error = %e, "failed to cache saved amount");
        }
        Ok(())
    }

    /// Record the timeline the user committed to
    pub fn set_committed_timeline(&self, timeline: impl Into<String>) {
        let timeline = timeline.into();
        let mut shared = self.inner.shared.lock();
        if let Err(e) = self.inner.cache.save_committed_timeline(&timeline) {
            tracing::warn!(error = %e, "failed to cache committed timeline");
        }
        shared.state.committed_timeline = timeline;
    }

    /// Set or clear the survey completed flag
    pub fn set_survey_completed(&self, completed: bool) {
        let mut shared = self.inner.shared.lock();
        shared.state.survey_completed = completed;
        if let Err(e) = self.inner.cache.set_survey_completed(completed) {
            tracing::warn!(error = %e, "failed to cache survey flag");
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn push_toggle(
        &self,
        run: RunId,
        guard: EpochGuard,
        token: SessionToken,
        step_id: u32,
        todo_id: TodoId,
        completed: bool,
    ) -> OpOutcome {
        let status = TodoStatus::from_completed(completed);
        let remote = &self.inner.remote;

        let result = match guard.run(remote.update_todo(&token, todo_id, status)).await {
            Err(SyncError::RecordNotFound(_)) => {
                tracing::debug!(%todo_id, step_id, "no todo record yet; creating");
                let todo = NewTodo {
                    todo_id,
                    step_id,
                    status,
                };
                guard.run(remote.add_todo(&token, &todo)).await
            }
            other => other,
        };

        match result {
            Ok(_) => {
                tracing::info!(%todo_id, ?status, "todo status synced");
                self.settle(run)
            }
            Err(e) => self.fail(run, &guard, e),
        }
    }

    /// Token and epoch guard, taken together under the state lock
    pub(crate) fn session(&self) -> Option<(SessionToken, EpochGuard)> {
        let shared = self.inner.shared.lock();
        shared
            .token
            .clone()
            .map(|token| (token, self.inner.epoch.guard()))
    }

    /// Apply `f` to state and cache if `guard` is still the live session
    pub(crate) fn commit<T>(
        &self,
        guard: &EpochGuard,
        f: impl FnOnce(&mut SessionState, &ProgressCache) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let mut shared = self.inner.shared.lock();
        if !guard.is_current() {
            return Err(SyncError::StaleSession);
        }
        f(&mut shared.state, &self.inner.cache)
    }

    /// Drop the session: advance the epoch, reset state, clear the cache
    ///
    /// With a guard, does nothing unless that guard is still current.
    /// Returns whether a reset happened.
    pub(crate) fn reset_session(&self, guard: Option<&EpochGuard>) -> Result<bool, SyncError> {
        let mut shared = self.inner.shared.lock();
        if guard.is_some_and(|g| !g.is_current()) {
            return Ok(false);
        }
        let epoch = self.inner.epoch.advance();
        shared.token = None;
        shared.state = SessionState::default();
        self.inner.cache.clear_all()?;
        tracing::info!(epoch, "session cleared");
        Ok(true)
    }

    fn begin(&self, op: Operation) -> RunId {
        self.inner.book.lock().begin(op)
    }

    fn finish(&self, run: RunId, phase: OpPhase) {
        if let Err(e) = self.inner.book.lock().finish(run, phase) {
            tracing::error!(op = %run.op, error = %e, "phase bookkeeping out of step");
        }
    }

    fn settle(&self, run: RunId) -> OpOutcome {
        self.finish(run, OpPhase::Settled);
        OpOutcome::Settled
    }

    fn fail(&self, run: RunId, guard: &EpochGuard, err: SyncError) -> OpOutcome {
        let op = run.op;
        self.finish(run, OpPhase::Failed);
        match &err {
            SyncError::StaleSession => {
                tracing::debug!(%op, epoch = guard.epoch(), "discarded result from previous session");
            }
            SyncError::ValidationFailure(_) => {
                tracing::error!(%op, error = %err, "remote payload failed validation");
            }
            e if e.forces_session_reset() => {
                tracing::warn!(%op, error = %err, "credential rejected; resetting session");
                if let Err(reset) = self.reset_session(Some(guard)) {
                    tracing::error!(error = %reset, "failed to clear cache after credential rejection");
                }
            }
            _ => {
                tracing::warn!(%op, error = %err, "remote operation failed; keeping local state");
            }
        }
        OpOutcome::Failed(err)
    }

    fn local_only(&self, op: Operation, reason: LocalReason) -> OpOutcome {
        tracing::debug!(%op, ?reason, "local-only");
        self.inner.book.lock().local_only(op);
        OpOutcome::LocalOnly(reason)
    }
}

/// Local result of a toggle plus its pending remote write
#[derive(Debug)]
pub struct ToggleHandle {
    completed: bool,
    write: RemoteWrite,
}

#[derive(Debug)]
enum RemoteWrite {
    Skipped(OpOutcome),
    Pending(JoinHandle<OpOutcome>),
}

impl ToggleHandle {
    fn local(completed: bool, outcome: OpOutcome) -> Self {
        Self {
            completed,
            write: RemoteWrite::Skipped(outcome),
        }
    }

    /// New completion value of the item
    #[inline]
    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// True when a remote write was started
    #[inline]
    #[must_use]
    pub fn has_remote_write(&self) -> bool {
        matches!(self.write, RemoteWrite::Pending(_))
    }

    /// Wait for the remote write
    pub async fn settled(self) -> OpOutcome {
        match self.write {
            RemoteWrite::Skipped(outcome) => outcome,
            RemoteWrite::Pending(task) => task.await.unwrap_or_else(|e| {
                OpOutcome::Failed(SyncError::NetworkFailure(format!("toggle task ended abnormally: {e}")))
            }),
        }
    }
}

pub(crate) fn persist(context: impl fmt::Display, result: Result<(), SyncError>) {
    if let Err(e) = result {
        tracing::warn!(%context, error = %e, "local cache write failed");
    }
}

/// Decode remote responses; `None` when the user has none
fn answers_from_responses(responses: &[SurveyResponse]) -> Result<Option<SurveyAnswers>, SyncError> {
    if responses.is_empty() {
        return Ok(None);
    }
    let mut answers = SurveyAnswers::default();
    for r in responses {
        let key = to_answer_key(r.question_id).ok_or_else(|| {
            SyncError::ValidationFailure(format!("unknown question id {}", r.question_id))
        })?;
        answers
            .set(key, r.response.clone())
            .map_err(|e| SyncError::ValidationFailure(e.to_string()))?;
    }
    Ok(Some(answers))
}

fn answers_to_responses(answers: &SurveyAnswers) -> Vec<SurveyResponse> {
    answers
        .answered()
        .map(|(key, value)| SurveyResponse {
            question_id: to_question_id(key),
            response: value.to_string(),
        })
        .collect()
}

fn completion_map(todos: &[UserTodo]) -> HashMap<TodoId, bool> {
    todos
        .iter()
        .filter(|t| {
            let known = to_frontend_id(t.todo_id).is_some();
            if !known {
                tracing::debug!(todo_id = %t.todo_id, "ignoring todo with no checklist item");
            }
            known
        })
        .map(|t| (t.todo_id, t.status.is_completed()))
        .collect()
}

/// Overwrite every flag from the remote map; all-or-nothing
fn apply_completion(steps: &mut [Step], done: &HashMap<TodoId, bool>) -> Result<(), SyncError> {
    let mut resolved = Vec::new();
    for item in steps.iter().flat_map(|s| s.todos.iter()) {
        let todo_id = lookup_backend_id(&item.frontend_id).ok_or_else(|| {
            SyncError::ValidationFailure(format!("no backend id for checklist item {}", item.frontend_id))
        })?;
        resolved.push(done.get(&todo_id).copied().unwrap_or(false));
    }
    for (item, completed) in steps.iter_mut().flat_map(|s| s.todos.iter_mut()).zip(resolved) {
        item.completed = completed;
    }
    Ok(())
}
