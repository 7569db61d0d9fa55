//! Error types for dividend distribution.
//!
//! `StorageUnavailable` is the only retryable kind. Every other kind aborts
//! the specific transition and is surfaced with the round and account that
//! caused it.

use super::value_objects::LedgerSeq;
use thiserror::Error;

/// All errors that can occur while computing or applying a dividend round.
#[derive(Debug, Error)]
pub enum DividendError {
    /// A Start/Apply/Done instruction is missing a field or cannot be decoded.
    #[error("Malformed round instruction: {reason}")]
    MalformedRound { reason: String },

    /// Transition attempted from the wrong state or for another ledger sequence.
    #[error("Round state conflict at ledger {ledger_seq}: {reason}")]
    RoundStateConflict { ledger_seq: LedgerSeq, reason: String },

    /// Apply targets an account that does not exist.
    #[error("Unknown account {account} in round {ledger_seq}")]
    UnknownAccount { ledger_seq: LedgerSeq, account: String },

    /// Account already stamped for this round.
    #[error("Dividend already applied to {account} in round {ledger_seq}")]
    DuplicateApplication { ledger_seq: LedgerSeq, account: String },

    /// Reference forest invariant violated (duplicate node, unresolved reference).
    #[error("Internal graph invariant violated: {0}")]
    InternalGraphInvariant(String),

    /// Should be unreachable with 128-bit intermediates.
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Durable result-map store unreachable. Retried by the submitter.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Signature missing or not produced by the round-controller key.
    #[error("Unauthorized round instruction: {0}")]
    Unauthorized(String),

    /// The same key was inserted into the result map twice.
    #[error("Duplicate result-map entry {key}")]
    DuplicateResultEntry { key: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Background computation task panicked or was cancelled.
    #[error("Round worker failed: {0}")]
    WorkerFailed(String),

    /// The apply side dropped its end of the hand-off queue.
    #[error("Round hand-off queue closed")]
    HandoffClosed,
}

impl DividendError {
    /// Whether the submitter should retry the failed step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DividendError::StorageUnavailable(_))
    }

    pub(crate) fn conflict(ledger_seq: LedgerSeq, reason: impl Into<String>) -> Self {
        DividendError::RoundStateConflict {
            ledger_seq,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DividendError::MalformedRound {
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        DividendError::ArithmeticOverflow(context.into())
    }
}

impl From<bincode::Error> for DividendError {
    fn from(err: bincode::Error) -> Self {
        DividendError::Serialization(err.to_string())
    }
}
