//! Roadmap Sync - local-first progress synchronization
//!
//! Keeps the roadmap state consistent across three places:
//! - In-memory session state, the only thing callers read
//! - A local key-value cache that survives restarts
//! - The remote store, authoritative for signed-in users
//!
//! Local writes always win immediately; the remote is reconciled on a
//! best-effort basis and login/logout transitions are fenced by session
//! epochs so no response from an old session lands in a new one.
//!
//! # Example
//!
//! ```rust,ignore
//! use roadmap_sync::{MemoryCache, SyncGateway};
//! use std::sync::Arc;
//!
//! # async fn example(remote: Arc<dyn roadmap_sync::RemoteStore>) -> Result<(), roadmap_sync::SyncError> {
//! let gateway = SyncGateway::open(Arc::new(MemoryCache::new()), remote).await;
//! let toggle = gateway.toggle_item(1, "1a").await?;
//! assert!(toggle.completed());
//! println!("{}% complete", gateway.snapshot().completion_percent);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod cache;
pub mod config;
pub mod epoch;
pub mod error;
pub mod gateway;
pub mod phase;
pub mod remote;
pub mod session;
pub mod state;

// Re-exports for convenience
pub use cache::{CacheKey, FileCache, LocalCache, MemoryCache, ProgressCache};
pub use config::SyncConfig;
pub use epoch::{EpochGuard, SessionEpoch};
pub use error::{CacheError, SyncError};
pub use gateway::{SyncGateway, ToggleHandle};
pub use phase::{
    allowed_transitions, validate_transition, LocalReason, OpOutcome, OpPhase, OpStats,
    Operation, PhaseError,
};
pub use remote::{
    AuthGrant, Credentials, NewTodo, Registration, RemoteStore, SessionToken, SessionUser,
    SurveyResponse, TodoStatus, UserTodo,
};
pub use session::{LoginOutcome, RegisterOutcome, ReloadReport};
pub use state::SessionState;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the sync layer
    pub use crate::{
        FileCache, LocalCache, MemoryCache, OpOutcome, RemoteStore, SessionState, SyncConfig,
        SyncError, SyncGateway,
    };
    pub use roadmap_core::{AnswerKey, ProgressSnapshot, StepStatus, SurveyAnswers};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
