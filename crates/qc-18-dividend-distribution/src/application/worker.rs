//! Background round computation.
//!
//! The computation is CPU-bound and must not stall the ledger's apply path,
//! so it runs on the blocking pool against an immutable snapshot. The
//! finished round is handed to the apply side through a bounded queue.

use crate::domain::DividendError;
use crate::ports::{LedgerSnapshotReader, ResultMapStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::service::{ComputedRound, DividendEngine, RoundPools, RoundSummary};

pub struct RoundWorker<S> {
    engine: Arc<DividendEngine>,
    handoff: mpsc::Sender<ComputedRound<S>>,
}

impl<S: ResultMapStore + 'static> RoundWorker<S> {
    /// Worker plus the receiving end of its hand-off queue.
    pub fn new(
        engine: Arc<DividendEngine>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ComputedRound<S>>) {
        let (handoff, rx) = mpsc::channel(capacity.max(1));
        (Self { engine, handoff }, rx)
    }

    /// Compute the round for `snapshot` off the async runtime and queue it.
    pub async fn compute<R>(
        &self,
        snapshot: Arc<R>,
        pools: RoundPools,
        store: S,
    ) -> Result<RoundSummary, DividendError>
    where
        R: LedgerSnapshotReader + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let ledger_seq = snapshot.ledger_seq();

        let round = tokio::task::spawn_blocking(move || {
            engine.compute_round(snapshot.as_ref(), pools, store)
        })
        .await
        .map_err(|e| {
            error!(ledger_seq, error = %e, "Round computation task failed");
            DividendError::WorkerFailed(e.to_string())
        })??;

        let summary = round.summary();
        self.handoff
            .send(round)
            .await
            .map_err(|_| DividendError::HandoffClosed)?;

        info!(
            ledger_seq,
            result_hash = %summary.result_hash,
            "Computed round queued for submission"
        );
        Ok(summary)
    }
}
