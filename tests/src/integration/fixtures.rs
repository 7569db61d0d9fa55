//! # Test Fixtures
//!
//! Ledgers with a sponsor tree, a preconfigured engine and sinks that fail
//! on demand.

use async_trait::async_trait;
use parking_lot::Mutex;
use qc_18_dividend_distribution::{
    AccountEntry, AccountId, ControllerKeypair, DirectLedgerSink, DividendConfig, DividendEngine,
    DividendError, InMemoryLedger, LedgerAccount, LedgerSeq, LedgerSnapshotReader,
    RoundInstruction, RoundStateMachine, RoundTransactionSink, SignedInstruction,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const CONTROLLER_SEED: [u8; 32] = [0xC0; 32];
pub const REMAINDER: AccountId = [0u8; 20];

pub type SharedLedger = Arc<InMemoryLedger>;

pub fn account(n: u16) -> AccountId {
    let mut id = [0u8; 20];
    id[18..].copy_from_slice(&n.to_be_bytes());
    id[0] = 0xA0;
    id
}

pub fn keypair() -> ControllerKeypair {
    ControllerKeypair::from_seed(CONTROLLER_SEED)
}

pub fn config() -> DividendConfig {
    DividendConfig {
        currency_unit: 1_000,
        min_qualifying_holding: 50_000,
        min_vbc_payout: 10,
        fee_share_spread_threshold: 1_000_000,
        coin_growth_numerator: 5,
        coin_growth_denominator: 1_000,
        remainder_account: hex::encode(REMAINDER),
        controller_public_key: Some(hex::encode(keypair().public_key().as_bytes())),
        submit_batch_limit: 4,
        storage_retry_attempts: 3,
        storage_retry_initial_delay_ms: 1,
        storage_retry_max_delay_ms: 4,
    }
}

pub fn engine() -> DividendEngine {
    DividendEngine::new(config()).expect("valid config")
}

/// Three sponsor trees, a few unqualified leaves and the remainder account.
pub fn tree_accounts() -> Vec<LedgerAccount> {
    let mut accounts = vec![LedgerAccount::new(REMAINDER, 0, 0)];
    for root in 0..3u16 {
        let root_id = account(root * 100);
        accounts.push(LedgerAccount::new(root_id, 10_000, 400_000 + root as u64 * 25_000));
        for child in 1..=5u16 {
            let child_id = account(root * 100 + child);
            accounts.push(
                LedgerAccount::new(child_id, 0, 60_000 * child as u64).with_parent(root_id),
            );
            for leaf in 1..=3u16 {
                let holding = if leaf == 3 { 20_000 } else { 75_000 + leaf as u64 };
                accounts.push(
                    LedgerAccount::new(account(root * 100 + child * 10 + leaf), 0, holding)
                        .with_parent(child_id),
                );
            }
        }
    }
    accounts
}

pub fn ledger(seq: LedgerSeq) -> SharedLedger {
    Arc::new(InMemoryLedger::with_accounts(seq, tree_accounts()))
}

pub fn machine(ledger: &SharedLedger) -> Arc<RoundStateMachine<SharedLedger>> {
    Arc::new(
        RoundStateMachine::from_config(ledger.clone(), &config()).expect("controller key"),
    )
}

pub fn direct_sink(ledger: &SharedLedger) -> DirectLedgerSink<SharedLedger> {
    DirectLedgerSink::new(machine(ledger))
}

pub fn totals(ledger: &InMemoryLedger) -> (u128, u128) {
    ledger.accounts().iter().fold((0, 0), |(c, v), a| {
        (c + a.coin_balance as u128, v + a.vbc_balance as u128)
    })
}

pub fn balances(ledger: &InMemoryLedger) -> Vec<(AccountId, u64, u64)> {
    ledger
        .accounts()
        .iter()
        .map(|a| (a.account_id, a.coin_balance, a.vbc_balance))
        .collect()
}

/// Snapshot reader that yields entries in exactly the order given.
pub struct OrderedSnapshot {
    pub ledger_seq: LedgerSeq,
    pub entries: Vec<AccountEntry>,
}

impl LedgerSnapshotReader for OrderedSnapshot {
    fn ledger_seq(&self) -> LedgerSeq {
        self.ledger_seq
    }

    fn accounts(&self) -> Result<Vec<AccountEntry>, DividendError> {
        Ok(self.entries.clone())
    }

    fn is_dividend_round_stamped(&self, account: &AccountId, round_seq: LedgerSeq) -> bool {
        self.entries
            .iter()
            .any(|e| e.account_id == *account && e.is_dividend_round_stamped(round_seq))
    }
}

/// Forwards to an inner sink until `budget` submissions went through, then
/// reports storage as unavailable forever. Simulates a node crash.
pub struct CrashingSink<K> {
    inner: K,
    budget: AtomicUsize,
    pub applied: Mutex<HashMap<AccountId, usize>>,
}

impl<K> CrashingSink<K> {
    pub fn new(inner: K, budget: usize) -> Self {
        Self {
            inner,
            budget: AtomicUsize::new(budget),
            applied: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<K: RoundTransactionSink> RoundTransactionSink for CrashingSink<K> {
    async fn submit(&self, transaction: SignedInstruction) -> Result<(), DividendError> {
        let allowed = self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(DividendError::StorageUnavailable("node down".into()));
        }
        let target = match &transaction.instruction {
            RoundInstruction::Apply(apply) => Some(apply.record.account_id),
            _ => None,
        };
        self.inner.submit(transaction).await?;
        if let Some(id) = target {
            *self.applied.lock().entry(id).or_default() += 1;
        }
        Ok(())
    }
}
