//! Account graph builder
//!
//! Scans a ledger snapshot once, classifies accounts and builds the
//! sponsor forest plus the balance-ordered index used for ranking.

use crate::domain::{
    account_hex, AccountEntry, AccountId, DividendError, NodeIndex, NodeKind, ReferenceForest,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Output of the graph build phase.
#[derive(Debug, Clone)]
pub struct AccountGraph {
    pub forest: ReferenceForest,
    /// Qualified nodes, ascending by (holding, account id).
    pub rank_index: Vec<NodeIndex>,
    pub accounts_scanned: usize,
    pub rejected_back_edges: usize,
}

/// Build the reference forest from snapshot entries.
///
/// - Below threshold and no sponsor: parked in the unqualified pool.
/// - At/above threshold, or sponsored: promoted into the forest.
/// - A sponsor not yet seen is recovered from the pool or created as a
///   zero-holding placeholder, resolved when its own entry arrives.
/// - Entries are processed in account-id order, so the result does not
///   depend on how the snapshot was iterated.
pub fn build_account_graph(
    entries: &[AccountEntry],
    min_qualifying_holding: u64,
) -> Result<AccountGraph, DividendError> {
    let mut ordered: Vec<&AccountEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.account_id);

    let mut forest = ReferenceForest::new();
    let mut unqualified: HashMap<AccountId, u64> = HashMap::new();
    let mut seen: HashSet<AccountId> = HashSet::with_capacity(ordered.len());
    let mut qualified: Vec<NodeIndex> = Vec::new();
    let mut rejected_back_edges = 0usize;

    for entry in &ordered {
        if !seen.insert(entry.account_id) {
            return Err(DividendError::InternalGraphInvariant(format!(
                "account {} appears twice in snapshot",
                account_hex(&entry.account_id)
            )));
        }

        let is_qualified = entry.holding >= min_qualifying_holding;
        let existing = forest.index_of(&entry.account_id);

        if !is_qualified && entry.parent.is_none() {
            match existing {
                // Someone already referenced it as their sponsor.
                Some(index) => forest.resolve(index, entry.holding)?,
                None => {
                    unqualified.insert(entry.account_id, entry.holding);
                }
            }
            continue;
        }

        let node = match existing {
            Some(index) => {
                forest.resolve(index, entry.holding)?;
                index
            }
            None => forest.insert(entry.account_id, entry.holding, NodeKind::Resolved)?,
        };
        if is_qualified {
            qualified.push(node);
        }

        let Some(parent_id) = entry.parent else {
            continue;
        };
        let parent = match forest.index_of(&parent_id) {
            Some(index) => index,
            None => match unqualified.remove(&parent_id) {
                Some(holding) => forest.insert(parent_id, holding, NodeKind::Resolved)?,
                None => forest.insert(parent_id, 0, NodeKind::Placeholder)?,
            },
        };

        if !forest.add_edge(parent, node)? {
            rejected_back_edges += 1;
            warn!(
                account = %account_hex(&entry.account_id),
                sponsor = %account_hex(&parent_id),
                "Refused sponsor edge that would revisit an ancestor"
            );
        }
    }

    let mut rank_index = qualified;
    {
        let forest = &forest;
        let mut keyed = Vec::with_capacity(rank_index.len());
        for index in rank_index.drain(..) {
            let record = forest.record(index)?;
            keyed.push((record.holding, record.account_id, index));
        }
        keyed.sort();
        rank_index.extend(keyed.into_iter().map(|(_, _, index)| index));
    }

    debug!(
        nodes = forest.len(),
        edges = forest.edge_count(),
        placeholders = forest.placeholder_count(),
        unqualified_pool = unqualified.len(),
        "Account graph built"
    );

    Ok(AccountGraph {
        forest,
        rank_index,
        accounts_scanned: ordered.len(),
        rejected_back_edges,
    })
}
