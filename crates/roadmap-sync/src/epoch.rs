//! Session epochs
//!
//! Every login, logout and forced reset advances the epoch. A remote call
//! captures the epoch it started under and is raced against the next
//! advance, so a response that outlives its session is dropped instead of
//! being written into the next one.

use crate::error::SyncError;
use std::future::Future;
use tokio::sync::watch;

/// Monotonic session counter with change notification
#[derive(Debug)]
pub struct SessionEpoch {
    tx: watch::Sender<u64>,
}

impl SessionEpoch {
    /// Start at epoch 0
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Current epoch
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Advance and wake every outstanding guard
    pub fn advance(&self) -> u64 {
        self.tx.send_modify(|epoch| *epoch += 1);
        let epoch = self.current();
        tracing::debug!(epoch, "session epoch advanced");
        epoch
    }

    /// Capture the current epoch
    #[must_use]
    pub fn guard(&self) -> EpochGuard {
        let rx = self.tx.subscribe();
        let epoch = *rx.borrow();
        EpochGuard { epoch, rx }
    }
}

impl Default for SessionEpoch {
    fn default() -> Self {
        Self::new()
    }
}

/// Token tying work to the epoch it started under
#[derive(Debug, Clone)]
pub struct EpochGuard {
    epoch: u64,
    rx: watch::Receiver<u64>,
}

impl EpochGuard {
    /// Epoch this guard was taken at
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True while no newer session has started
    #[must_use]
    pub fn is_current(&self) -> bool {
        *self.rx.borrow() == self.epoch
    }

    /// Run `fut` unless the session changes first
    ///
    /// Returns `StaleSession` if the epoch has already moved or moves while
    /// `fut` is pending; `fut` is dropped in that case.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        if !self.is_current() {
            return Err(SyncError::StaleSession);
        }
        let mut rx = self.rx.clone();
        let epoch = self.epoch;
        tokio::select! {
            biased;
            () = wait_for_change(&mut rx, epoch) => Err(SyncError::StaleSession),
            result = fut => result,
        }
    }
}

async fn wait_for_change(rx: &mut watch::Receiver<u64>, epoch: u64) {
    loop {
        if *rx.borrow_and_update() != epoch {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: no further sessions can start
            std::future::pending::<()>().await;
        }
    }
}
