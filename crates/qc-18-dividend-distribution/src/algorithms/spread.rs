//! Spread (network-effect) calculation.
//!
//! Post-order over the sponsor forest. When a node finishes, every
//! descendant has already contributed to it:
//!
//! 1. A qualified node with a non-zero accumulator swaps the decayed weight
//!    of its largest child subtree for the cube-root dampened value, so one
//!    outsized descendant cannot dominate.
//! 2. The node's `subtree + holding` propagates to its parent; a qualified
//!    parent also accumulates the decayed contribution and tracks the
//!    largest child seen.

use super::math::{checked_add, checked_sub, dampen, decay};
use crate::domain::{DividendError, NodeIndex, ReferenceForest};

/// Parameters of the spread metric.
#[derive(Clone, Copy, Debug)]
pub struct SpreadParams {
    pub min_qualifying_holding: u64,
    pub currency_unit: u64,
}

/// Compute per-node spread and subtree holding. Returns `sum_spread`.
pub fn compute_spreads(
    forest: &mut ReferenceForest,
    params: SpreadParams,
) -> Result<u64, DividendError> {
    let mut sum_spread = 0u64;

    forest.depth_first_finish(|forest, node| {
        finish_node(forest, node, params, &mut sum_spread)
    })?;

    Ok(sum_spread)
}

fn finish_node(
    forest: &mut ReferenceForest,
    node: NodeIndex,
    params: SpreadParams,
    sum_spread: &mut u64,
) -> Result<(), DividendError> {
    let threshold = params.min_qualifying_holding;

    let record = forest.record_mut(node)?;
    let qualified = record.holding >= threshold;

    if qualified {
        if record.spread != 0 {
            let max_child = record.max_child_subtree_holding;
            let without_max = checked_sub(record.spread, decay(max_child, threshold)?, "spread")?;
            record.spread = checked_add(
                without_max,
                dampen(max_child, params.currency_unit)?,
                "spread",
            )?;
        }
        *sum_spread = checked_add(*sum_spread, record.spread, "sum_spread")?;
    }

    let contribution = checked_add(record.subtree_holding, record.holding, "subtree_holding")?;
    let Some(parent) = record.parent else {
        return Ok(());
    };

    let parent = forest.record_mut(parent)?;
    parent.subtree_holding = checked_add(parent.subtree_holding, contribution, "subtree_holding")?;
    if parent.holding >= threshold {
        parent.spread = checked_add(parent.spread, decay(contribution, threshold)?, "spread")?;
        if contribution > parent.max_child_subtree_holding {
            parent.max_child_subtree_holding = contribution;
        }
    }

    Ok(())
}
