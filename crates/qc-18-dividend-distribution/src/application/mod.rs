//! Application layer: round computation, background worker, ledger-side
//! state machine and resumable submission.

pub mod service;
pub mod state_machine;
pub mod submitter;
pub mod worker;

pub use service::{ComputedRound, DividendEngine, RoundPools, RoundSummary};
pub use state_machine::RoundStateMachine;
pub use submitter::{
    BatchOutcome, PendingBatch, RejectedPayout, RoundSubmitter, SubmissionReport,
};
pub use worker::RoundWorker;
