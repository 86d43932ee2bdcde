//! Remote operation phases
//!
//! Each logical remote operation runs through
//! `Idle -> InFlight -> {Settled, Failed}`. A settled or failed run may be
//! started again; every other move is illegal.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// The four remote-backed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    /// Pull survey responses
    LoadAnswers,
    /// Pull todo completion
    LoadChecklist,
    /// Push survey answers
    SubmitAnswers,
    /// Push one todo toggle
    ToggleItem,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadAnswers => "load_answers",
            Self::LoadChecklist => "load_checklist",
            Self::SubmitAnswers => "submit_answers",
            Self::ToggleItem => "toggle_item",
        };
        f.write_str(name)
    }
}

/// Phase of one operation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpPhase {
    /// Not started
    Idle,
    /// Waiting on the remote
    InFlight,
    /// Remote confirmed; state and cache updated
    Settled,
    /// Remote failed; local state is the fallback of record
    Failed,
}

/// Phase machine error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    /// Transition not in the allowed table
    #[error("illegal phase transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current phase
        from: OpPhase,
        /// Requested phase
        to: OpPhase,
    },
    /// Run was never started or has already finished
    #[error("no live run {seq} for {op}")]
    UnknownRun {
        /// Operation the run belongs to
        op: Operation,
        /// Run sequence number
        seq: u64,
    },
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: OpPhase) -> Vec<OpPhase> {
    use OpPhase::*;
    match from {
        Idle | Settled | Failed => vec![InFlight],
        InFlight => vec![Settled, Failed],
    }
}

/// Validates a phase transition
pub fn validate_transition(from: OpPhase, to: OpPhase) -> Result<(), PhaseError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PhaseError::IllegalTransition { from, to })
    }
}

/// Why an operation completed without touching the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalReason {
    /// No session token
    Anonymous,
    /// Item has no backend id
    UnmappedItem(String),
    /// Nothing answered, nothing to send
    NothingToSend,
}

/// Result of one operation run
#[derive(Debug, Clone)]
pub enum OpOutcome {
    /// Remote confirmed
    Settled,
    /// Remote failed; local state kept
    Failed(crate::error::SyncError),
    /// Remote never contacted
    LocalOnly(LocalReason),
}

impl OpOutcome {
    /// True for [`OpOutcome::Settled`]
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled)
    }

    /// True for [`OpOutcome::LocalOnly`]
    #[inline]
    #[must_use]
    pub fn is_local_only(&self) -> bool {
        matches!(self, Self::LocalOnly(_))
    }

    /// The failure, if any
    #[must_use]
    pub fn error(&self) -> Option<&crate::error::SyncError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Counters for one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpStats {
    /// Runs currently waiting on the remote
    pub in_flight: usize,
    /// Runs the remote confirmed
    pub settled: u64,
    /// Runs that failed remotely
    pub failed: u64,
    /// Runs that never reached the remote
    pub local_only: u64,
    /// Phase of the most recently finished run
    pub last_phase: Option<OpPhase>,
}

/// Handle for one started run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RunId {
    pub(crate) op: Operation,
    seq: u64,
}

/// Per-operation bookkeeping
///
/// Every started run keeps its own phase until it finishes, so a run that
/// finishes twice or finishes into a non-terminal phase is rejected.
#[derive(Debug, Default)]
pub(crate) struct PhaseBook {
    stats: HashMap<Operation, OpStats>,
    runs: HashMap<RunId, OpPhase>,
    next_seq: u64,
}

impl PhaseBook {
    pub(crate) fn begin(&mut self, op: Operation) -> RunId {
        self.next_seq += 1;
        let run = RunId {
            op,
            seq: self.next_seq,
        };
        self.runs.insert(run, OpPhase::InFlight);
        let stats = self.stats.entry(op).or_default();
        stats.in_flight += 1;
        tracing::debug!(%op, seq = run.seq, in_flight = stats.in_flight, "operation in flight");
        run
    }

    pub(crate) fn finish(&mut self, run: RunId, to: OpPhase) -> Result<(), PhaseError> {
        let Some(&from) = self.runs.get(&run) else {
            return Err(PhaseError::UnknownRun {
                op: run.op,
                seq: run.seq,
            });
        };
        validate_transition(from, to)?;
        self.runs.remove(&run);

        let stats = self.stats.entry(run.op).or_default();
        stats.in_flight = stats.in_flight.saturating_sub(1);
        stats.last_phase = Some(to);
        match to {
            OpPhase::Settled => stats.settled += 1,
            OpPhase::Failed => stats.failed += 1,
            OpPhase::Idle | OpPhase::InFlight => {}
        }
        tracing::debug!(op = %run.op, seq = run.seq, phase = ?to, "operation finished");
        Ok(())
    }

    pub(crate) fn local_only(&mut self, op: Operation) {
        self.stats.entry(op).or_default().local_only += 1;
    }

    pub(crate) fn get(&self, op: Operation) -> OpStats {
        self.stats.get(&op).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_cycle() {
        assert!(validate_transition(OpPhase::Idle, OpPhase::InFlight).is_ok());
        assert!(validate_transition(OpPhase::InFlight, OpPhase::Settled).is_ok());
        assert!(validate_transition(OpPhase::InFlight, OpPhase::Failed).is_ok());
        assert!(validate_transition(OpPhase::Failed, OpPhase::InFlight).is_ok());
        assert!(validate_transition(OpPhase::Settled, OpPhase::InFlight).is_ok());
    }

    #[test]
    fn illegal_moves() {
        assert!(validate_transition(OpPhase::Idle, OpPhase::Settled).is_err());
        assert!(validate_transition(OpPhase::Settled, OpPhase::Failed).is_err());
        assert!(validate_transition(OpPhase::InFlight, OpPhase::Idle).is_err());
    }

    #[test]
    fn book_counts_overlapping_runs() {
        let mut book = PhaseBook::default();
        let first = book.begin(Operation::ToggleItem);
        let second = book.begin(Operation::ToggleItem);
        assert_ne!(first, second);
        assert_eq!(book.get(Operation::ToggleItem).in_flight, 2);

        book.finish(second, OpPhase::Settled).unwrap();
        book.finish(first, OpPhase::Failed).unwrap();
        let stats = book.get(Operation::ToggleItem);
        assert_eq!((stats.in_flight, stats.settled, stats.failed), (0, 1, 1));
        assert_eq!(stats.last_phase, Some(OpPhase::Failed));
    }

    #[test]
    fn run_cannot_finish_twice() {
        let mut book = PhaseBook::default();
        let run = book.begin(Operation::LoadAnswers);
        book.finish(run, OpPhase::Settled).unwrap();

        let err = book.finish(run, OpPhase::Failed).unwrap_err();
        assert!(matches!(err, PhaseError::UnknownRun { op: Operation::LoadAnswers, .. }));
        let stats = book.get(Operation::LoadAnswers);
        assert_eq!((stats.settled, stats.failed), (1, 0));
    }

    #[test]
    fn run_must_finish_in_terminal_phase() {
        let mut book = PhaseBook::default();
        let run = book.begin(Operation::SubmitAnswers);

        let err = book.finish(run, OpPhase::Idle).unwrap_err();
        assert_eq!(
            err,
            PhaseError::IllegalTransition {
                from: OpPhase::InFlight,
                to: OpPhase::Idle
            }
        );
        // rejected finish leaves the run live
        assert_eq!(book.get(Operation::SubmitAnswers).in_flight, 1);
        book.finish(run, OpPhase::Settled).unwrap();
        assert_eq!(book.get(Operation::SubmitAnswers).in_flight, 0);
    }
}
