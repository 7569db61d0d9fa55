//! Distribution engine
//!
//! Turns the two coin pools plus per-account rank and spread into exact
//! payouts. Half of the VBC pool is split by rank, the other half by spread.
//! Floor-division losses and payouts zeroed by the minimum filter all end up
//! with the remainder account, so a round always conserves both pools.

use super::math::{checked_add, checked_sub, mul_div, mul_div_wide};
use crate::domain::{account_hex, AccountId, DividendError, PayoutRecord, ReferenceForest};
use tracing::{debug, warn};

/// Round-level inputs to the distribution pass.
#[derive(Clone, Debug)]
pub struct DistributionParams {
    /// Coin pool. `None` derives it from the forest's total holding.
    pub total_coins: Option<u64>,
    pub total_coins_vbc: u64,
    pub min_vbc_payout: u64,
    pub fee_share_spread_threshold: u64,
    pub coin_growth_numerator: u64,
    pub coin_growth_denominator: u64,
    pub remainder_account: AccountId,
}

/// Result of the distribution pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Distribution {
    pub total_coins: u64,
    pub total_coins_vbc: u64,
    /// Sorted by account id, remainder entry included.
    pub records: Vec<PayoutRecord>,
    pub remaining_coins: u64,
    pub remaining_vbc: u64,
    /// Accounts whose VBC share fell below the minimum payout.
    pub below_minimum: usize,
}

impl Distribution {
    pub fn coin_sum(&self) -> u128 {
        self.records.iter().map(|r| r.coin_amount as u128).sum()
    }

    pub fn vbc_sum(&self) -> u128 {
        self.records.iter().map(|r| r.vbc_amount as u128).sum()
    }
}

/// Coin pool implied by the growth ratio over every resolved node.
///
/// `floor(sum * n / d) >= sum(floor(h * n / d))`, so the derived pool always
/// covers the per-account coin payouts.
pub fn derive_total_coins(
    forest: &ReferenceForest,
    numerator: u64,
    denominator: u64,
) -> Result<u64, DividendError> {
    let total_holding: u128 = forest
        .records()
        .filter(|r| !r.is_placeholder())
        .map(|r| r.holding as u128)
        .sum();
    mul_div_wide(total_holding, numerator, denominator)
}

/// Compute payouts for every resolved node.
pub fn distribute(
    forest: &ReferenceForest,
    sum_rank: u64,
    sum_spread: u64,
    params: &DistributionParams,
) -> Result<Distribution, DividendError> {
    let total_coins = match params.total_coins {
        Some(total) => total,
        None => derive_total_coins(
            forest,
            params.coin_growth_numerator,
            params.coin_growth_denominator,
        )?,
    };
    let total_vbc = params.total_coins_vbc;
    let rank_pool = total_vbc / 2;
    let spread_pool = total_vbc - rank_pool;

    let mut records = Vec::new();
    let mut paid_coins = 0u64;
    let mut paid_vbc = 0u64;
    let mut below_minimum = 0usize;

    for node in forest.sorted_records() {
        if node.is_placeholder() {
            debug!(
                account = %account_hex(&node.account_id),
                "Skipping unresolved sponsor placeholder"
            );
            continue;
        }

        let vbc_by_rank = mul_div(rank_pool, node.rank, sum_rank)?;
        let vbc_by_spread = mul_div(spread_pool, node.spread, sum_spread)?;
        let raw_vbc = checked_add(vbc_by_rank, vbc_by_spread, "vbc_amount")?;

        let mut record = PayoutRecord {
            account_id: node.account_id,
            rank: node.rank,
            spread: node.spread,
            subtree_holding: node.subtree_holding,
            ..PayoutRecord::new(node.account_id)
        };

        if raw_vbc == 0 || raw_vbc >= params.min_vbc_payout {
            record.vbc_by_rank = vbc_by_rank;
            record.vbc_by_spread = vbc_by_spread;
            record.vbc_amount = raw_vbc;
            record.coin_amount = mul_div(
                node.holding,
                params.coin_growth_numerator,
                params.coin_growth_denominator,
            )?;
        } else {
            below_minimum += 1;
            debug!(
                account = %account_hex(&node.account_id),
                vbc = raw_vbc,
                min = params.min_vbc_payout,
                "VBC share below minimum payout, returned to remainder"
            );
        }

        let visible = record.coin_amount != 0
            || record.vbc_amount != 0
            || record.spread > params.fee_share_spread_threshold;
        if !visible {
            continue;
        }

        paid_coins = checked_add(paid_coins, record.coin_amount, "paid_coins")?;
        paid_vbc = checked_add(paid_vbc, record.vbc_amount, "paid_vbc")?;
        records.push(record);
    }

    let remaining_coins = checked_sub(total_coins, paid_coins, "coin pool").map_err(|e| {
        warn!(total_coins, paid_coins, "Coin pool smaller than computed payouts");
        e
    })?;
    let remaining_vbc = checked_sub(total_vbc, paid_vbc, "vbc pool")?;

    if remaining_coins > 0 || remaining_vbc > 0 {
        credit_remainder(
            &mut records,
            params.remainder_account,
            remaining_coins,
            remaining_vbc,
        )?;
    }

    Ok(Distribution {
        total_coins,
        total_coins_vbc: total_vbc,
        records,
        remaining_coins,
        remaining_vbc,
        below_minimum,
    })
}

/// Add both remainders to the system account, keeping `records` sorted.
fn credit_remainder(
    records: &mut Vec<PayoutRecord>,
    account: AccountId,
    coins: u64,
    vbc: u64,
) -> Result<(), DividendError> {
    match records.binary_search_by_key(&account, |r| r.account_id) {
        Ok(position) => {
            let record = &mut records[position];
            record.coin_amount = checked_add(record.coin_amount, coins, "remainder coins")?;
            record.vbc_amount = checked_add(record.vbc_amount, vbc, "remainder vbc")?;
        }
        Err(position) => {
            let record = PayoutRecord {
                coin_amount: coins,
                vbc_amount: vbc,
                ..PayoutRecord::new(account)
            };
            records.insert(position, record);
        }
    }
    Ok(())
}
