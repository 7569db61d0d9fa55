//! Dense ranking by holding size.
//!
//! Walks the ascending balance index. A group of equal holdings shares the
//! 1-based position of its first member, so `100, 100, 50` ranks as
//! `50 -> 1`, `100 -> 2`, `100 -> 2` with a rank sum of 5.

use super::math::checked_add;
use crate::domain::{DividendError, NodeIndex, ReferenceForest};

/// Assign ranks in place and return `sum_rank`.
///
/// An empty index yields `sum_rank == 0`, which disables the rank pool.
pub fn assign_ranks(
    forest: &mut ReferenceForest,
    rank_index: &[NodeIndex],
) -> Result<u64, DividendError> {
    let mut last_holding: Option<u64> = None;
    let mut current_rank = 0u64;
    let mut sum_rank = 0u64;

    for (position, index) in rank_index.iter().enumerate() {
        let record = forest.record_mut(*index)?;
        if last_holding.map_or(true, |last| record.holding > last) {
            current_rank = position as u64 + 1;
            last_holding = Some(record.holding);
        } else if last_holding.map_or(false, |last| record.holding < last) {
            return Err(DividendError::InternalGraphInvariant(
                "rank index is not ascending".to_string(),
            ));
        }
        record.rank = current_rank;
        sum_rank = checked_add(sum_rank, current_rank, "sum_rank")?;
    }

    Ok(sum_rank)
}
