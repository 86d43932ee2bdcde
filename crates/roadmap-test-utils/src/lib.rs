//! Testing utilities for the roadmap workspace
//!
//! Shared test helpers, fixtures, and an in-process remote store.

#![allow(missing_docs)]

mod fake;

pub use fake::{FakeRemote, RemoteCall};

use roadmap_core::{AnswerKey, SurveyAnswers};
use roadmap_sync::{LocalCache, MemoryCache, SessionUser, SyncGateway};
use std::sync::Arc;

pub const TEST_EMAIL: &str = "sam@example.com";
pub const TEST_PASSWORD: &str = "correct horse";

/// All five questions answered
pub fn complete_answers() -> SurveyAnswers {
    SurveyAnswers {
        income: "$50,000 - $100,000".into(),
        savings: "$10,000 - $25,000".into(),
        location: "I have a general area in mind".into(),
        timeline: "3-6 months".into(),
        housing: "Renting".into(),
    }
}

/// Only the timeline answered
pub fn timeline_only(timeline: &str) -> SurveyAnswers {
    let mut answers = SurveyAnswers::new();
    answers.set(AnswerKey::Timeline, timeline).unwrap();
    answers
}

/// Fake remote with the standard test account
pub fn fake_remote() -> (Arc<FakeRemote>, SessionUser) {
    let remote = Arc::new(FakeRemote::new());
    let user = remote.with_account("sam", TEST_EMAIL, TEST_PASSWORD);
    (remote, user)
}

/// Anonymous gateway over a fresh memory cache
pub fn anonymous_gateway(remote: Arc<FakeRemote>) -> (SyncGateway, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let gateway = SyncGateway::new(cache.clone() as Arc<dyn LocalCache>, remote);
    (gateway, cache)
}

/// Gateway logged in as the standard test account
pub async fn signed_in_gateway(remote: Arc<FakeRemote>) -> (SyncGateway, Arc<MemoryCache>) {
    let (gateway, cache) = anonymous_gateway(remote);
    gateway.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    (gateway, cache)
}
