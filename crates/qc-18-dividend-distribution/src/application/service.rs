//! Dividend Engine
//!
//! Computes one round from an immutable ledger snapshot:
//! 1. Build the sponsor forest
//! 2. Assign dense ranks
//! 3. Compute spreads (post-order)
//! 4. Distribute both pools, collect remainders
//! 5. Encode every payout into the result map and commit its root
//!
//! Pure with respect to the snapshot: identical snapshots and pools produce
//! identical records and `result_hash` on every node.

use crate::algorithms::{
    assign_ranks, build_account_graph, compute_spreads, distribute, DistributionParams,
    SpreadParams,
};
use crate::config::DividendConfig;
use crate::domain::{
    hash_hex, ApplyPayout, DividendError, FinishRound, Hash, LedgerSeq, PayoutRecord,
    RoundInstruction, RoundStatistics, StartRound,
};
use crate::merkle::ResultMap;
use crate::ports::{LedgerSnapshotReader, ResultMapStore};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Coin pools for one round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPools {
    /// Coin pool. `None` derives it from the configured growth ratio.
    pub total_coins: Option<u64>,
    pub total_coins_vbc: u64,
}

impl RoundPools {
    pub fn vbc(total_coins_vbc: u64) -> Self {
        Self {
            total_coins: None,
            total_coins_vbc,
        }
    }
}

/// Output of a round computation, handed to the submitter.
pub struct ComputedRound<S> {
    pub header: StartRound,
    /// Sorted by account id.
    pub records: Vec<PayoutRecord>,
    pub result_map: ResultMap<S>,
    pub remaining_coins: u64,
    pub remaining_vbc: u64,
    pub statistics: RoundStatistics,
}

impl<S> ComputedRound<S> {
    pub fn ledger_seq(&self) -> LedgerSeq {
        self.header.ledger_seq
    }

    pub fn result_hash(&self) -> Hash {
        self.header.result_hash
    }

    pub fn start_instruction(&self) -> RoundInstruction {
        RoundInstruction::Start(self.header.clone())
    }

    pub fn done_instruction(&self) -> RoundInstruction {
        RoundInstruction::Done(FinishRound {
            ledger_seq: self.header.ledger_seq,
            result_hash: self.header.result_hash,
        })
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            ledger_seq: self.header.ledger_seq,
            total_coins: self.header.total_coins,
            total_coins_vbc: self.header.total_coins_vbc,
            sum_rank: self.header.sum_rank,
            sum_spread: self.header.sum_spread,
            result_hash: hash_hex(&self.header.result_hash),
            payout_records: self.records.len(),
            remaining_coins: self.remaining_coins,
            remaining_vbc: self.remaining_vbc,
            statistics: self.statistics.clone(),
        }
    }
}

/// Serializable round report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub ledger_seq: LedgerSeq,
    pub total_coins: u64,
    pub total_coins_vbc: u64,
    pub sum_rank: u64,
    pub sum_spread: u64,
    pub result_hash: String,
    pub payout_records: usize,
    pub remaining_coins: u64,
    pub remaining_vbc: u64,
    pub statistics: RoundStatistics,
}

/// Round computation service.
#[derive(Clone, Debug)]
pub struct DividendEngine {
    config: DividendConfig,
}

impl DividendEngine {
    /// Create an engine after validating `config`.
    pub fn new(config: DividendConfig) -> Result<Self, DividendError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DividendConfig {
        &self.config
    }

    /// Compute the round for `snapshot` and persist its result map to `store`.
    pub fn compute_round<R, S>(
        &self,
        snapshot: &R,
        pools: RoundPools,
        store: S,
    ) -> Result<ComputedRound<S>, DividendError>
    where
        R: LedgerSnapshotReader + ?Sized,
        S: ResultMapStore,
    {
        let ledger_seq = snapshot.ledger_seq();
        if ledger_seq == 0 {
            return Err(DividendError::malformed(
                "snapshot ledger sequence must be non-zero",
            ));
        }
        let threshold = self.config.min_qualifying_holding;
        let entries = snapshot.accounts()?;

        // 1. Forest
        let mut graph = build_account_graph(&entries, threshold)?;
        info!(
            ledger_seq,
            accounts = graph.accounts_scanned,
            nodes = graph.forest.len(),
            qualified = graph.rank_index.len(),
            rejected_edges = graph.rejected_back_edges,
            "Account graph built"
        );

        // 2. Rank
        let sum_rank = assign_ranks(&mut graph.forest, &graph.rank_index)?;
        info!(ledger_seq, sum_rank, "Ranks assigned");

        // 3. Spread
        let sum_spread = compute_spreads(
            &mut graph.forest,
            SpreadParams {
                min_qualifying_holding: threshold,
                currency_unit: self.config.currency_unit,
            },
        )?;
        info!(ledger_seq, sum_spread, "Spreads computed");

        // 4. Distribution
        let remainder_account = self.config.remainder_account()?;
        let distribution = distribute(
            &graph.forest,
            sum_rank,
            sum_spread,
            &DistributionParams {
                total_coins: pools.total_coins,
                total_coins_vbc: pools.total_coins_vbc,
                min_vbc_payout: self.config.min_vbc_payout,
                fee_share_spread_threshold: self.config.fee_share_spread_threshold,
                coin_growth_numerator: self.config.coin_growth_numerator,
                coin_growth_denominator: self.config.coin_growth_denominator,
                remainder_account,
            },
        )?;
        info!(
            ledger_seq,
            total_coins = distribution.total_coins,
            total_coins_vbc = distribution.total_coins_vbc,
            records = distribution.records.len(),
            remaining_coins = distribution.remaining_coins,
            remaining_vbc = distribution.remaining_vbc,
            below_minimum = distribution.below_minimum,
            "Pools distributed"
        );

        // 5. Result map
        let mut result_map = ResultMap::new(store);
        for record in &distribution.records {
            result_map.insert_payout(&ApplyPayout::new(ledger_seq, record.clone()))?;
        }
        let result_hash = result_map.commit()?;
        info!(
            ledger_seq,
            result_hash = %hash_hex(&result_hash),
            "Result map committed"
        );

        let statistics = RoundStatistics {
            accounts_scanned: graph.accounts_scanned,
            forest_nodes: graph.forest.len(),
            placeholder_nodes: graph.forest.placeholder_count(),
            qualified_accounts: graph.rank_index.len(),
            rejected_back_edges: graph.rejected_back_edges,
            payout_records: distribution.records.len(),
        };

        Ok(ComputedRound {
            header: StartRound {
                ledger_seq,
                total_coins: distribution.total_coins,
                total_coins_vbc: distribution.total_coins_vbc,
                sum_rank,
                sum_spread,
                result_hash,
            },
            records: distribution.records,
            result_map,
            remaining_coins: distribution.remaining_coins,
            remaining_vbc: distribution.remaining_vbc,
            statistics,
        })
    }
}
