use crate::application::RoundStateMachine;
use crate::domain::{DividendError, SignedInstruction};
use crate::ports::{LedgerStateStore, RoundTransactionSink};
use async_trait::async_trait;
use std::sync::Arc;

/// Sink that applies instructions straight to a local state machine.
///
/// Stands in for the transaction pipeline on a single node and in tests.
pub struct DirectLedgerSink<L> {
    machine: Arc<RoundStateMachine<L>>,
}

impl<L> DirectLedgerSink<L> {
    pub fn new(machine: Arc<RoundStateMachine<L>>) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &RoundStateMachine<L> {
        &self.machine
    }
}

#[async_trait]
impl<L: LedgerStateStore> RoundTransactionSink for DirectLedgerSink<L> {
    async fn submit(&self, transaction: SignedInstruction) -> Result<(), DividendError> {
        self.machine.apply(&transaction).map(|_| ())
    }
}
