//! Outbound Ports (Driven Ports / SPI)
//!
//! Collaborators the dividend core depends on but does not own: the ledger
//! snapshot, the ledger's durable state, the content-addressed node store
//! and the transaction pipeline that carries round instructions.

use crate::domain::{
    AccountEntry, AccountId, DividendError, DividendRound, Hash, LedgerAccount, LedgerChanges,
    LedgerSeq, SignedInstruction, ZERO_HASH,
};
use crate::merkle::MapNode;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Read-only view of a ledger snapshot.
///
/// Implementations must be immutable for their whole lifetime; the round
/// computation iterates them without holding any lock.
pub trait LedgerSnapshotReader: Send + Sync {
    /// Sequence of the ledger this snapshot was taken from.
    fn ledger_seq(&self) -> LedgerSeq;

    /// Every account entry, in any order.
    fn accounts(&self) -> Result<Vec<AccountEntry>, DividendError>;

    fn is_dividend_round_stamped(&self, account: &AccountId, round_seq: LedgerSeq) -> bool;
}

/// Durable ledger state touched by round transitions.
pub trait LedgerStateStore: Send + Sync {
    /// The live dividend object. `Idle` default when none was ever written.
    fn dividend_round(&self) -> Result<DividendRound, DividendError>;

    fn account(&self, account: &AccountId) -> Result<Option<LedgerAccount>, DividendError>;

    /// Apply all writes of one transition atomically.
    fn commit(&self, changes: LedgerChanges) -> Result<(), DividendError>;
}

impl<T: LedgerStateStore + ?Sized> LedgerStateStore for Arc<T> {
    fn dividend_round(&self) -> Result<DividendRound, DividendError> {
        (**self).dividend_round()
    }

    fn account(&self, account: &AccountId) -> Result<Option<LedgerAccount>, DividendError> {
        (**self).account(account)
    }

    fn commit(&self, changes: LedgerChanges) -> Result<(), DividendError> {
        (**self).commit(changes)
    }
}

/// Content-addressed store for result-map nodes.
pub trait ResultMapStore: Send + Sync {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, DividendError>;

    fn put_node(&self, hash: Hash, data: Vec<u8>) -> Result<(), DividendError>;

    fn batch_put(&self, nodes: Vec<(Hash, Vec<u8>)>) -> Result<(), DividendError> {
        for (hash, data) in nodes {
            self.put_node(hash, data)?;
        }
        Ok(())
    }

    /// Hashes reachable from `root` that this store does not hold.
    ///
    /// Breadth-first from the root, stopping after `limit` results. Subtrees
    /// below a missing node cannot be inspected and are not reported.
    fn missing_descendants(&self, root: &Hash, limit: usize) -> Result<Vec<Hash>, DividendError> {
        let mut missing = Vec::new();
        if *root == ZERO_HASH || limit == 0 {
            return Ok(missing);
        }

        let mut queue = VecDeque::from([*root]);
        let mut visited = HashSet::new();
        while let Some(hash) = queue.pop_front() {
            if !visited.insert(hash) {
                continue;
            }
            match self.get_node(&hash)? {
                Some(bytes) => queue.extend(MapNode::decode(&bytes)?.child_hashes()),
                None => {
                    missing.push(hash);
                    if missing.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(missing)
    }
}

impl<T: ResultMapStore + ?Sized> ResultMapStore for Arc<T> {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, DividendError> {
        (**self).get_node(hash)
    }

    fn put_node(&self, hash: Hash, data: Vec<u8>) -> Result<(), DividendError> {
        (**self).put_node(hash, data)
    }

    fn batch_put(&self, nodes: Vec<(Hash, Vec<u8>)>) -> Result<(), DividendError> {
        (**self).batch_put(nodes)
    }
}

/// Pipeline that carries signed round instructions into the ledger.
#[async_trait]
pub trait RoundTransactionSink: Send + Sync {
    async fn submit(&self, transaction: SignedInstruction) -> Result<(), DividendError>;
}

#[async_trait]
impl<T: RoundTransactionSink + ?Sized> RoundTransactionSink for Arc<T> {
    async fn submit(&self, transaction: SignedInstruction) -> Result<(), DividendError> {
        (**self).submit(transaction).await
    }
}
