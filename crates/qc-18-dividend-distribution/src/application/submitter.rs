//! # Round Submitter
//!
//! Drives a computed round into the ledger: Start, bounded batches of Apply
//! and finally Done.
//!
//! ## Resumption
//!
//! Entries are submitted in ascending key order, so the ledger's resume
//! marker (the highest applied key) is a safe restart point. A restarted
//! submitter reopens the persisted result map from the on-ledger
//! `result_hash` and continues after the marker.
//!
//! Idempotence lives in the ledger (per-account round stamp). The submitter
//! only avoids wasted work: it skips accounts that are already stamped and
//! treats a `DuplicateApplication` rejection as "already applied". Before
//! Done it sweeps the whole map once more, in the same bounded bursts, so an
//! entry below the marker that was never applied is not skipped. Entries the
//! ledger already rejected during this drive are not resubmitted.

use crate::config::{DividendConfig, RetryPolicy};
use crate::domain::{
    account_hex, hash_hex, ApplyPayout, ControllerKeypair, DividendError, DividendRound,
    FinishRound, Hash, LedgerSeq, RoundInstruction, RoundState, StartRound,
};
use crate::merkle::ResultMap;
use crate::ports::{ResultMapStore, RoundQuery, RoundTransactionSink};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use tracing::{error, info, warn};

use super::service::ComputedRound;

/// Apply entries selected for one submission burst.
#[derive(Clone, Debug, Default)]
pub struct PendingBatch {
    pub entries: Vec<(Hash, ApplyPayout)>,
    /// Entries passed over because their account is already stamped.
    pub already_applied: usize,
    /// Last key visited, submitted or not. The next batch starts after it.
    pub last_visited: Option<Hash>,
    /// No entries remain after `last_visited`.
    pub exhausted: bool,
}

/// Outcome of one submission burst.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub skipped: usize,
    pub rejected: Vec<RejectedPayout>,
    pub last_visited: Option<Hash>,
    pub exhausted: bool,
}

/// A payout the ledger refused for a non-retryable reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedPayout {
    /// Result-map key of the refused entry.
    #[serde(skip)]
    pub key: Hash,
    pub account: String,
    pub reason: String,
}

/// Result of driving a round to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionReport {
    pub ledger_seq: LedgerSeq,
    pub started: bool,
    pub applied: usize,
    pub skipped: usize,
    pub batches: usize,
    pub rejected: Vec<RejectedPayout>,
    pub finished: bool,
}

pub struct RoundSubmitter<S, Q, K> {
    header: StartRound,
    map: ResultMap<S>,
    query: Q,
    sink: K,
    keypair: ControllerKeypair,
    batch_limit: usize,
    retry: RetryPolicy,
}

impl<S, Q, K> RoundSubmitter<S, Q, K>
where
    S: ResultMapStore,
    Q: RoundQuery,
    K: RoundTransactionSink,
{
    /// Submitter for a freshly computed round.
    pub fn new(
        round: ComputedRound<S>,
        query: Q,
        sink: K,
        keypair: ControllerKeypair,
        config: &DividendConfig,
    ) -> Self {
        Self {
            header: round.header,
            map: round.result_map,
            query,
            sink,
            keypair,
            batch_limit: config.submit_batch_limit.max(1),
            retry: config.retry_policy(),
        }
    }

    /// Submitter for a round already started on the ledger, e.g. after a
    /// crash. The result map is reopened from `store` at the round's hash.
    pub fn resume(
        store: S,
        round: &DividendRound,
        query: Q,
        sink: K,
        keypair: ControllerKeypair,
        config: &DividendConfig,
    ) -> Result<Self, DividendError> {
        if round.state == RoundState::Idle {
            return Err(DividendError::conflict(
                round.ledger_seq,
                "no round to resume",
            ));
        }
        let map = ResultMap::open(store, round.result_hash)?;
        Ok(Self {
            header: StartRound {
                ledger_seq: round.ledger_seq,
                total_coins: round.total_coins,
                total_coins_vbc: round.total_coins_vbc,
                sum_rank: round.sum_rank,
                sum_spread: round.sum_spread,
                result_hash: round.result_hash,
            },
            map,
            query,
            sink,
            keypair,
            batch_limit: config.submit_batch_limit.max(1),
            retry: config.retry_policy(),
        })
    }

    pub fn ledger_seq(&self) -> LedgerSeq {
        self.header.ledger_seq
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Current on-ledger resume marker for this round.
    pub fn resume_point(&self) -> Result<Option<Hash>, DividendError> {
        let round = self.query.current_round()?;
        if round.ledger_seq == self.header.ledger_seq && round.is_started() {
            Ok(round.resume_point())
        } else {
            Ok(None)
        }
    }

    /// Collect up to `limit` unapplied entries with key greater than `after`.
    pub fn next_batch(
        &self,
        after: Option<&Hash>,
        limit: usize,
    ) -> Result<PendingBatch, DividendError> {
        self.collect_batch(after, limit, &HashSet::new())
    }

    /// Like `next_batch`, passing over every key in `excluded`.
    fn collect_batch(
        &self,
        after: Option<&Hash>,
        limit: usize,
        excluded: &HashSet<Hash>,
    ) -> Result<PendingBatch, DividendError> {
        let seq = self.header.ledger_seq;
        let mut batch = PendingBatch {
            exhausted: true,
            ..Default::default()
        };

        self.map.walk_after(after, |key, value| {
            if batch.entries.len() >= limit {
                batch.exhausted = false;
                return Ok(false);
            }
            if excluded.contains(key) {
                batch.last_visited = Some(*key);
                return Ok(true);
            }
            let apply = RoundInstruction::decode_apply(value)?;
            if apply.ledger_seq != seq {
                return Err(DividendError::conflict(
                    seq,
                    format!("result map holds an entry for round {}", apply.ledger_seq),
                ));
            }
            batch.last_visited = Some(*key);
            if self.is_applied(&apply)? {
                batch.already_applied += 1;
            } else {
                batch.entries.push((*key, apply));
            }
            Ok(true)
        })?;

        Ok(batch)
    }

    /// Submit one burst of at most `limit` Apply instructions after `after`.
    pub async fn submit_batch(
        &self,
        after: Option<&Hash>,
        limit: usize,
    ) -> Result<BatchOutcome, DividendError> {
        self.submit_batch_excluding(after, limit, &HashSet::new())
            .await
    }

    async fn submit_batch_excluding(
        &self,
        after: Option<&Hash>,
        limit: usize,
        excluded: &HashSet<Hash>,
    ) -> Result<BatchOutcome, DividendError> {
        let after = after.copied();
        let batch = self
            .retrying("collect batch", move || async move {
                self.collect_batch(after.as_ref(), limit, excluded)
            })
            .await?;

        let mut outcome = BatchOutcome {
            skipped: batch.already_applied,
            last_visited: batch.last_visited,
            exhausted: batch.exhausted,
            ..Default::default()
        };

        for (key, apply) in batch.entries {
            let account = account_hex(&apply.record.account_id);
            match self.submit(RoundInstruction::Apply(apply)).await {
                Ok(()) => outcome.applied += 1,
                Err(DividendError::DuplicateApplication { .. }) => outcome.skipped += 1,
                Err(error) if error.is_retryable() => return Err(error),
                Err(error) => {
                    error!(
                        ledger_seq = self.header.ledger_seq,
                        account = %account,
                        %error,
                        "Payout rejected by ledger"
                    );
                    outcome.rejected.push(RejectedPayout {
                        key,
                        account,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Run the round to `Done`, resuming from whatever the ledger shows.
    pub async fn drive(&self) -> Result<SubmissionReport, DividendError> {
        let seq = self.header.ledger_seq;
        let mut report = SubmissionReport {
            ledger_seq: seq,
            ..Default::default()
        };

        let round = self.query.current_round()?;
        let same_round = round.ledger_seq == seq;
        if same_round && round.result_hash != self.header.result_hash {
            return Err(DividendError::conflict(
                seq,
                format!(
                    "ledger round has result hash {}, submitter holds {}",
                    hash_hex(&round.result_hash),
                    hash_hex(&self.header.result_hash)
                ),
            ));
        }
        match round.state {
            RoundState::Done if same_round => {
                info!(ledger_seq = seq, "Round already done");
                report.finished = true;
                return Ok(report);
            }
            RoundState::Started if same_round => {
                info!(
                    ledger_seq = seq,
                    marker = %hash_hex(&round.resume_marker),
                    "Resuming started round"
                );
            }
            _ => {
                self.submit(RoundInstruction::Start(self.header.clone()))
                    .await?;
                report.started = true;
            }
        }

        let mut rejected = HashSet::new();
        let start = self.resume_point()?;
        self.run_pass(start, &mut rejected, &mut report, true).await?;

        // Anything below the starting marker that never landed.
        let before = report.applied;
        self.run_pass(None, &mut rejected, &mut report, false).await?;
        if report.applied > before {
            warn!(
                ledger_seq = seq,
                applied = report.applied - before,
                "Applied entries that lay below the resume marker"
            );
        }

        if !report.rejected.is_empty() {
            error!(
                ledger_seq = seq,
                rejected = report.rejected.len(),
                "Finishing round with rejected payouts"
            );
        }

        self.submit(RoundInstruction::Done(FinishRound {
            ledger_seq: seq,
            result_hash: self.header.result_hash,
        }))
        .await?;
        report.finished = true;

        info!(
            ledger_seq = seq,
            applied = report.applied,
            skipped = report.skipped,
            batches = report.batches,
            "Round submission complete"
        );
        Ok(report)
    }

    /// Submit bounded batches from `cursor` to the end of the map.
    ///
    /// Keys rejected here are added to `rejected` and never resubmitted by a
    /// later pass. Only the main pass counts batches and skipped entries.
    async fn run_pass(
        &self,
        mut cursor: Option<Hash>,
        rejected: &mut HashSet<Hash>,
        report: &mut SubmissionReport,
        main_pass: bool,
    ) -> Result<(), DividendError> {
        loop {
            let outcome = self
                .submit_batch_excluding(cursor.as_ref(), self.batch_limit, rejected)
                .await?;
            rejected.extend(outcome.rejected.iter().map(|r| r.key));
            report.applied += outcome.applied;
            report.rejected.extend(outcome.rejected);
            if main_pass {
                report.batches += 1;
                report.skipped += outcome.skipped;
            }
            if outcome.last_visited.is_some() {
                cursor = outcome.last_visited;
            }
            if outcome.exhausted {
                return Ok(());
            }
        }
    }

    fn is_applied(&self, apply: &ApplyPayout) -> Result<bool, DividendError> {
        match self.query.account_dividend(&apply.record.account_id) {
            Ok(stamp) => Ok(stamp.is_some_and(|s| s.ledger_seq == apply.ledger_seq)),
            // The ledger rejects it with a logged reason on submission.
            Err(DividendError::UnknownAccount { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    async fn submit(&self, instruction: RoundInstruction) -> Result<(), DividendError> {
        let step = instruction.kind();
        let signed = self.keypair.sign(instruction);
        self.retrying(step, move || self.sink.submit(signed.clone()))
            .await
    }

    async fn retrying<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T, DividendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DividendError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Err(error) if error.is_retryable() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Storage unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
