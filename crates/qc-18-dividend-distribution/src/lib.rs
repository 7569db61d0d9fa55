//! # QC-18: Dividend Distribution Subsystem
//!
//! Periodic network-wide dividend rounds. Each round scans an immutable
//! ledger snapshot, builds the sponsor forest, ranks and spreads every
//! qualifying account, splits the coin and VBC pools exactly and commits
//! all payouts into a Merkle-indexed result map whose root every validator
//! must agree on. The ledger then moves through Start, Apply and Done one
//! signed instruction at a time, and an interrupted submission resumes from
//! the on-ledger marker.
//!
//! ## Architecture
//!
//! - **Domain**: Accounts, the reference forest arena, round instructions, controller authority
//! - **Algorithms**: Forest construction, dense rank, spread, pool distribution
//! - **Merkle**: Patricia result map with proofs and ordered walks
//! - **Ports**: Inbound (RoundQuery) and Outbound (snapshot, ledger state, node store, sink)
//! - **Application**: Engine, background worker, ledger state machine, submitter
//! - **Adapters**: In-memory ledger and node store, local sink, RocksDB node store
//!
//! ## Round lifecycle
//!
//! ```text
//!   snapshot ──► DividendEngine ──► ComputedRound ──► RoundSubmitter
//!                                        │                 │
//!                                  result map root    Start / Apply* / Done
//!                                                          │
//!                                                   RoundStateMachine (ledger)
//! ```

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod merkle;
pub mod ports;

pub use adapters::{DirectLedgerSink, InMemoryLedger, InMemoryResultMapStore, LedgerSnapshot};
#[cfg(feature = "rocksdb")]
pub use adapters::RocksDbResultMapStore;
pub use application::{
    ComputedRound, DividendEngine, RoundPools, RoundStateMachine, RoundSubmitter, RoundSummary,
    RoundWorker, SubmissionReport,
};
pub use config::{DividendConfig, RetryPolicy};
pub use domain::errors::DividendError;
pub use domain::value_objects::*;
pub use domain::{
    AccountEntry, ApplyPayout, ControllerKey, ControllerKeypair, DividendRound, DividendStamp, LedgerAccount,
    PayoutRecord, RoundInstruction, RoundState, SignedInstruction,
};
pub use merkle::{verify_proof, MapProof, ResultMap};
pub use ports::inbound::RoundQuery;
pub use ports::outbound::{
    LedgerSnapshotReader, LedgerStateStore, ResultMapStore, RoundTransactionSink,
};
