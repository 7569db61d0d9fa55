use crate::domain::{
    AccountEntry, AccountId, DividendError, DividendRound, LedgerAccount, LedgerChanges, LedgerSeq,
};
use crate::ports::{LedgerSnapshotReader, LedgerStateStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
struct LedgerState {
    ledger_seq: LedgerSeq,
    round: DividendRound,
    accounts: BTreeMap<AccountId, LedgerAccount>,
}

/// In-memory ledger state.
///
/// A single write lock covers the dividend object and all accounts, so one
/// `commit` is atomic with respect to readers.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(ledger_seq: LedgerSeq) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                ledger_seq,
                ..Default::default()
            }),
        }
    }

    pub fn with_accounts(ledger_seq: LedgerSeq, accounts: Vec<LedgerAccount>) -> Self {
        let ledger = Self::new(ledger_seq);
        for account in accounts {
            ledger.upsert_account(account);
        }
        ledger
    }

    pub fn upsert_account(&self, account: LedgerAccount) {
        self.state
            .write()
            .accounts
            .insert(account.account_id, account);
    }

    pub fn ledger_seq(&self) -> LedgerSeq {
        self.state.read().ledger_seq
    }

    /// Close the current ledger and open the next one.
    pub fn advance(&self) -> LedgerSeq {
        let mut state = self.state.write();
        state.ledger_seq += 1;
        state.ledger_seq
    }

    pub fn accounts(&self) -> Vec<LedgerAccount> {
        self.state.read().accounts.values().cloned().collect()
    }

    /// Immutable copy of the current account set.
    pub fn snapshot(&self) -> Arc<LedgerSnapshot> {
        let state = self.state.read();
        Arc::new(LedgerSnapshot::new(
            state.ledger_seq,
            state.accounts.values().map(LedgerAccount::to_entry).collect(),
        ))
    }
}

impl LedgerStateStore for InMemoryLedger {
    fn dividend_round(&self) -> Result<DividendRound, DividendError> {
        Ok(self.state.read().round.clone())
    }

    fn account(&self, account: &AccountId) -> Result<Option<LedgerAccount>, DividendError> {
        Ok(self.state.read().accounts.get(account).cloned())
    }

    fn commit(&self, changes: LedgerChanges) -> Result<(), DividendError> {
        let mut state = self.state.write();
        if let Some(round) = changes.round {
            state.round = round;
        }
        for account in changes.accounts {
            state.accounts.insert(account.account_id, account);
        }
        Ok(())
    }
}

/// Frozen account set of one ledger.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    ledger_seq: LedgerSeq,
    entries: BTreeMap<AccountId, AccountEntry>,
}

impl LedgerSnapshot {
    pub fn new(ledger_seq: LedgerSeq, entries: Vec<AccountEntry>) -> Self {
        Self {
            ledger_seq,
            entries: entries.into_iter().map(|e| (e.account_id, e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LedgerSnapshotReader for LedgerSnapshot {
    fn ledger_seq(&self) -> LedgerSeq {
        self.ledger_seq
    }

    fn accounts(&self) -> Result<Vec<AccountEntry>, DividendError> {
        Ok(self.entries.values().cloned().collect())
    }

    fn is_dividend_round_stamped(&self, account: &AccountId, round_seq: LedgerSeq) -> bool {
        self.entries
            .get(account)
            .is_some_and(|entry| entry.is_dividend_round_stamped(round_seq))
    }
}
