//! End-to-end sync flows against the in-process remote

use roadmap_core::{QuestionId, StepStatus, TodoId};
use roadmap_sync::{
    CacheKey, LocalCache, LocalReason, MemoryCache, OpOutcome, Operation, SyncError, SyncGateway,
    TodoStatus,
};
use roadmap_test_utils::{
    anonymous_gateway, complete_answers, fake_remote, signed_in_gateway, timeline_only,
    RemoteCall, TEST_EMAIL, TEST_PASSWORD,
};
use std::sync::Arc;
use std::time::Duration;

fn item_completed(gateway: &SyncGateway, step_id: u32, item: &str) -> bool {
    gateway
        .state()
        .steps
        .iter()
        .find(|s| s.id == step_id)
        .and_then(|s| s.item(item))
        .is_some_and(|i| i.completed)
}

#[tokio::test]
async fn anonymous_session_never_calls_remote() {
    let (remote, _) = fake_remote();
    let (gateway, cache) = anonymous_gateway(remote.clone());

    let toggle = gateway.toggle_item(1, "1a").await.unwrap();
    assert!(toggle.completed());
    assert!(!toggle.has_remote_write());
    assert!(matches!(
        toggle.settled().await,
        OpOutcome::LocalOnly(LocalReason::Anonymous)
    ));

    let submitted = gateway.submit_answers(complete_answers()).await.unwrap();
    assert!(matches!(submitted, OpOutcome::LocalOnly(LocalReason::Anonymous)));
    assert!(gateway.load_answers().await.is_local_only());
    assert!(gateway.load_checklist().await.is_local_only());

    assert_eq!(remote.call_count(), 0);
    assert!(cache.load(CacheKey::Steps).unwrap().is_some());
    assert!(cache.load(CacheKey::Answers).unwrap().is_some());
    assert!(gateway.state().survey_completed);
}

#[tokio::test]
async fn login_replaces_anonymous_progress_with_remote() {
    let (remote, user) = fake_remote();
    remote.seed_todo(user.id, TodoId(4), TodoStatus::Completed);
    remote.seed_todo(user.id, TodoId(2), TodoStatus::Completed);
    remote.seed_response(user.id, QuestionId(4), "6-12 months");

    let (gateway, cache) = anonymous_gateway(remote.clone());
    gateway.toggle_item(1, "1a").await.unwrap();
    gateway.submit_answers(complete_answers()).await.unwrap();
    gateway.set_saved_amount(500.0).unwrap();
    gateway.set_committed_timeline("3-6 months");

    let outcome = gateway.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    assert_eq!(outcome.user.id, user.id);
    assert!(outcome.reload.answers.is_settled());
    assert!(outcome.reload.checklist.is_settled());
    assert!(outcome.reload.survey_completed);

    let state = gateway.state();
    assert!(state.authenticated);
    assert!(!item_completed(&gateway, 1, "1a"));
    assert!(item_completed(&gateway, 2, "2c"));
    assert_eq!(state.answers, timeline_only("6-12 months"));
    // Not modeled remotely; survives the login
    assert_eq!(state.saved_amount, 500.0);
    assert_eq!(state.committed_timeline, "3-6 months");

    assert!(cache.load(CacheKey::SessionToken).unwrap().is_some());
    assert_eq!(
        gateway.cache().load_answers().unwrap(),
        Some(timeline_only("6-12 months"))
    );
}

#[tokio::test]
async fn toggle_creates_missing_record_then_updates_it() {
    let (remote, user) = fake_remote();
    let (gateway, _) = signed_in_gateway(remote.clone()).await;
    remote.clear_calls();

    let first = gateway.toggle_item(1, "1a").await.unwrap();
    assert!(first.settled().await.is_settled());
    let second = gateway.toggle_item(1, "1a").await.unwrap();
    assert!(!second.completed());
    assert!(second.settled().await.is_settled());

    assert_eq!(
        remote.calls(),
        vec![
            RemoteCall::UpdateTodo {
                todo_id: TodoId(3),
                status: TodoStatus::Completed
            },
            RemoteCall::AddTodo {
                todo_id: TodoId(3),
                step_id: 1,
                status: TodoStatus::Completed
            },
            RemoteCall::UpdateTodo {
                todo_id: TodoId(3),
                status: TodoStatus::Pending
            },
        ]
    );
    assert_eq!(remote.todo_status(user.id, TodoId(3)), Some(TodoStatus::Pending));
    assert!(!item_completed(&gateway, 1, "1a"));
    assert_eq!(gateway.stats(Operation::ToggleItem).settled, 2);
}

#[tokio::test]
async fn overlapping_toggles_keep_last_local_value() {
    let (remote, _) = fake_remote();
    let (gateway, _) = signed_in_gateway(remote.clone()).await;
    remote.clear_calls();
    remote.set_latency(Duration::from_millis(50));

    let first = gateway.toggle_item(2, "2a").await.unwrap();
    let second = gateway.toggle_item(2, "2a").await.unwrap();
    assert!(first.completed());
    assert!(!second.completed());
    assert!(!item_completed(&gateway, 2, "2a"));
    assert_eq!(gateway.stats(Operation::ToggleItem).in_flight, 2);

    assert!(first.settled().await.is_settled());
    assert!(second.settled().await.is_settled());

    let calls = remote.calls();
    let mut updates: Vec<TodoStatus> = calls
        .iter()
        .filter_map(|call| match call {
            RemoteCall::UpdateTodo { todo_id, status } if *todo_id == TodoId(9) => Some(*status),
            _ => None,
        })
        .collect();
    updates.sort_by_key(|status| status.is_completed());
    assert_eq!(updates, vec![TodoStatus::Pending, TodoStatus::Completed]);
    let creates = calls
        .iter()
        .filter(|call| matches!(call, RemoteCall::AddTodo { todo_id: TodoId(9), step_id: 2, .. }))
        .count();
    assert_eq!(creates, 2);

    assert!(!item_completed(&gateway, 2, "2a"));
    let cached = gateway.cache().load_steps().unwrap().unwrap();
    assert!(!cached[1].item("2a").unwrap().completed);
    let stats = gateway.stats(Operation::ToggleItem);
    assert_eq!((stats.in_flight, stats.settled), (0, 2));
}

#[tokio::test]
async fn offline_toggle_keeps_local_value_until_next_load() {
    let (remote, _) = fake_remote();
    let (gateway, cache) = signed_in_gateway(remote.clone()).await;

    remote.set_offline(true);
    let outcome = gateway.toggle_item(2, "2a").await.unwrap().settled().await;
    assert!(matches!(outcome, OpOutcome::Failed(SyncError::NetworkFailure(_))));
    assert!(item_completed(&gateway, 2, "2a"));
    assert!(gateway.is_authenticated());
    let cached = gateway.cache().load_steps().unwrap().unwrap();
    assert!(cached[1].todos[0].completed);

    // The remote never saw the write; its view wins on the next load
    remote.set_offline(false);
    assert!(gateway.load_checklist().await.is_settled());
    assert!(!item_completed(&gateway, 2, "2a"));
    assert!(cache.load(CacheKey::Steps).unwrap().is_some());
}

#[tokio::test]
async fn rejected_token_resets_to_anonymous() {
    let (remote, _) = fake_remote();
    let (gateway, cache) = signed_in_gateway(remote.clone()).await;
    gateway.set_committed_timeline("3-6 months");

    remote.revoke_all();
    let outcome = gateway.toggle_item(1, "1b").await.unwrap().settled().await;

    assert!(matches!(
        outcome,
        OpOutcome::Failed(SyncError::AuthRejected { status: 403 })
    ));
    assert!(!gateway.is_authenticated());
    assert_eq!(gateway.state(), roadmap_sync::SessionState::default());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn logout_discards_in_flight_write() {
    let (remote, user) = fake_remote();
    let (gateway, cache) = signed_in_gateway(remote.clone()).await;
    remote.set_latency(Duration::from_millis(200));

    let handle = gateway.toggle_item(1, "1a").await.unwrap();
    assert!(handle.has_remote_write());
    gateway.logout().unwrap();

    let outcome = handle.settled().await;
    assert!(matches!(outcome, OpOutcome::Failed(SyncError::StaleSession)));
    assert!(!gateway.is_authenticated());
    assert!(!item_completed(&gateway, 1, "1a"));
    assert!(cache.is_empty());
    assert_eq!(remote.todo_status(user.id, TodoId(3)), None);
}

#[tokio::test]
async fn logout_during_reload_leaves_anonymous_state() {
    let (remote, user) = fake_remote();
    remote.seed_response(user.id, QuestionId(1), "$150,000+");
    let (gateway, cache) = signed_in_gateway(remote.clone()).await;
    remote.set_latency(Duration::from_millis(200));

    let reloading = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.reload_user_data().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    gateway.logout().unwrap();

    let result = reloading.await.unwrap();
    assert!(matches!(result, Err(SyncError::StaleSession)));
    assert!(gateway.state().answers.is_empty());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn empty_remote_answers_do_not_clobber_local() {
    let (remote, _) = fake_remote();
    let (gateway, _) = signed_in_gateway(remote.clone()).await;

    remote.fail_next(SyncError::NetworkFailure("timeout".into()));
    let result = gateway.submit_answers(complete_answers()).await;
    assert!(matches!(result, Err(SyncError::NetworkFailure(_))));
    assert_eq!(gateway.state().answers, complete_answers());

    assert!(gateway.load_answers().await.is_settled());
    assert_eq!(gateway.state().answers, complete_answers());
}

#[tokio::test]
async fn submit_sends_only_answered_questions() {
    let (remote, user) = fake_remote();
    let (gateway, _) = signed_in_gateway(remote.clone()).await;
    remote.clear_calls();

    let outcome = gateway.submit_answers(timeline_only("3-6 months")).await.unwrap();
    assert!(outcome.is_settled());
    assert_eq!(
        remote.calls(),
        vec![RemoteCall::SubmitSurveyResponses {
            question_ids: vec![QuestionId(4)]
        }]
    );
    assert_eq!(
        remote.responses_for(user.id).get(&QuestionId(4)).map(String::as_str),
        Some("3-6 months")
    );
}

#[tokio::test]
async fn register_carries_anonymous_answers() {
    let (remote, _) = fake_remote();
    let (gateway, _) = anonymous_gateway(remote.clone());
    gateway.submit_answers(complete_answers()).await.unwrap();

    let outcome = gateway
        .register("alex", "alex@example.com", "pw")
        .await
        .unwrap();
    assert!(outcome.submitted.is_settled());
    assert_eq!(remote.responses_for(outcome.user.id).len(), 5);
    assert_eq!(gateway.state().answers, complete_answers());
}

#[tokio::test]
async fn duplicate_registration_is_surfaced() {
    let (remote, _) = fake_remote();
    let (gateway, _) = anonymous_gateway(remote);
    let err = gateway
        .register("sam", TEST_EMAIL, "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Rejected { status: 400, .. }));
    assert!(!gateway.is_authenticated());
}

#[tokio::test]
async fn open_hydrates_and_refreshes() {
    let (remote, user) = fake_remote();
    remote.seed_todo(user.id, TodoId(3), TodoStatus::Completed);

    let cache = Arc::new(MemoryCache::new());
    {
        let first = SyncGateway::new(cache.clone(), remote.clone());
        first.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    }
    // Progress pulled at login is cached; drop it so only the refresh can restore it
    cache.remove(CacheKey::Steps).unwrap();
    cache.save(CacheKey::SavedAmount, "1200").unwrap();

    let gateway = SyncGateway::open(cache.clone(), remote.clone()).await;
    assert!(gateway.is_authenticated());
    assert!(item_completed(&gateway, 1, "1a"));
    assert_eq!(gateway.state().saved_amount, 1200.0);
    assert_eq!(gateway.roadmap()[0].status, StepStatus::Active);
}

#[tokio::test]
async fn locked_steps_cannot_be_opened() {
    let (remote, _) = fake_remote();
    let (gateway, _) = anonymous_gateway(remote);

    assert!(gateway.open_step(1).is_ok());
    assert!(gateway.open_step(2).is_err());
    for item in ["1a", "1b", "1c", "1d"] {
        gateway.toggle_item(1, item).await.unwrap();
    }
    assert!(gateway.open_step(2).is_ok());
    assert_eq!(gateway.snapshot().active_step_id, Some(2));
}
