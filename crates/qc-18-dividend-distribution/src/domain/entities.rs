//! # Domain Entities for Dividend Distribution
//!
//! ## Type Decisions
//!
//! - Holdings, pools and payouts are `u64` base units. Every proportional
//!   computation widens to `u128` before multiplying (see `algorithms::math`).
//! - Ranks and spreads are `u64`; their sums are the normalization
//!   denominators of the distribution pass.
//!
//! ## Persistence
//!
//! `DividendRound` and `DividendStamp` are durable ledger state. Their serde
//! layout must stay stable across restarts because resumption reads them back.

use super::value_objects::{account_hex, AccountId, Hash, LedgerSeq, ZERO_HASH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One account as seen by the round computation in a ledger snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    /// Balance in the ranked currency (VBC).
    pub holding: u64,
    /// Sponsor that introduced this account.
    pub parent: Option<AccountId>,
    /// Ledger sequence of the last round that paid this account.
    pub last_round: Option<LedgerSeq>,
}

impl AccountEntry {
    pub fn new(account_id: AccountId, holding: u64) -> Self {
        Self {
            account_id,
            holding,
            parent: None,
            last_round: None,
        }
    }

    /// Builder method to set the sponsor.
    pub fn with_parent(mut self, parent: AccountId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn is_dividend_round_stamped(&self, round_seq: LedgerSeq) -> bool {
        self.last_round == Some(round_seq)
    }
}

/// Fields stamped onto an account by an Apply transition.
///
/// The stamp marks the account as paid for `ledger_seq`; a second Apply for
/// the same round is rejected by comparing against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendStamp {
    pub ledger_seq: LedgerSeq,
    pub rank: u64,
    pub spread: u64,
    pub subtree_holding: u64,
    pub coin_amount: u64,
    pub vbc_amount: u64,
}

/// Ledger-side account state touched by round transitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub account_id: AccountId,
    /// Native coin balance.
    pub coin_balance: u64,
    /// VBC balance, the holding used for ranking.
    pub vbc_balance: u64,
    pub parent: Option<AccountId>,
    pub last_dividend: Option<DividendStamp>,
}

impl LedgerAccount {
    pub fn new(account_id: AccountId, coin_balance: u64, vbc_balance: u64) -> Self {
        Self {
            account_id,
            coin_balance,
            vbc_balance,
            parent: None,
            last_dividend: None,
        }
    }

    pub fn with_parent(mut self, parent: AccountId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Whether this account was already paid in `round_seq`.
    pub fn is_stamped_for(&self, round_seq: LedgerSeq) -> bool {
        self.last_dividend
            .map(|stamp| stamp.ledger_seq == round_seq)
            .unwrap_or(false)
    }

    /// Snapshot view of this account.
    pub fn to_entry(&self) -> AccountEntry {
        AccountEntry {
            account_id: self.account_id,
            holding: self.vbc_balance,
            parent: self.parent,
            last_round: self.last_dividend.map(|stamp| stamp.ledger_seq),
        }
    }
}

/// Lifecycle state of the ledger's dividend object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    #[default]
    Idle,
    Started,
    Done,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Idle => write!(f, "Idle"),
            RoundState::Started => write!(f, "Started"),
            RoundState::Done => write!(f, "Done"),
        }
    }
}

/// The single live dividend object of a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendRound {
    pub state: RoundState,
    pub ledger_seq: LedgerSeq,
    pub total_coins: u64,
    pub total_coins_vbc: u64,
    pub sum_rank: u64,
    pub sum_spread: u64,
    pub result_hash: Hash,
    /// Key of the highest applied result-map entry.
    pub resume_marker: Hash,
}

impl Default for DividendRound {
    fn default() -> Self {
        Self {
            state: RoundState::Idle,
            ledger_seq: 0,
            total_coins: 0,
            total_coins_vbc: 0,
            sum_rank: 0,
            sum_spread: 0,
            result_hash: ZERO_HASH,
            resume_marker: ZERO_HASH,
        }
    }
}

impl DividendRound {
    pub fn is_started(&self) -> bool {
        self.state == RoundState::Started
    }

    /// Resume marker, or `None` when nothing has been applied yet.
    pub fn resume_point(&self) -> Option<Hash> {
        if self.resume_marker == ZERO_HASH {
            None
        } else {
            Some(self.resume_marker)
        }
    }
}

/// Computed allocation for one account in one round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub account_id: AccountId,
    pub coin_amount: u64,
    pub vbc_amount: u64,
    pub vbc_by_rank: u64,
    pub vbc_by_spread: u64,
    pub rank: u64,
    pub spread: u64,
    pub subtree_holding: u64,
}

impl PayoutRecord {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            ..Default::default()
        }
    }

    /// Stamp written to the account when this record is applied.
    pub fn stamp(&self, ledger_seq: LedgerSeq) -> DividendStamp {
        DividendStamp {
            ledger_seq,
            rank: self.rank,
            spread: self.spread,
            subtree_holding: self.subtree_holding,
            coin_amount: self.coin_amount,
            vbc_amount: self.vbc_amount,
        }
    }

    pub fn account_hex(&self) -> String {
        account_hex(&self.account_id)
    }
}

/// Atomic set of ledger writes produced by one successful transition.
#[derive(Clone, Debug, Default)]
pub struct LedgerChanges {
    pub round: Option<DividendRound>,
    pub accounts: Vec<LedgerAccount>,
}

/// Counters collected while a round is computed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStatistics {
    pub accounts_scanned: usize,
    pub forest_nodes: usize,
    pub placeholder_nodes: usize,
    pub qualified_accounts: usize,
    pub rejected_back_edges: usize,
    pub payout_records: usize,
}
