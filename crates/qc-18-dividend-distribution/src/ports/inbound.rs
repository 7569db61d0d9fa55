//! Inbound Ports (Driving Ports / API)
//!
//! Read-only round query surface for reporting layers.

use super::outbound::LedgerStateStore;
use crate::domain::{AccountId, DividendError, DividendRound, DividendStamp};

/// Round query API.
pub trait RoundQuery: Send + Sync {
    /// The ledger's live dividend object.
    fn current_round(&self) -> Result<DividendRound, DividendError>;

    /// Payout fields stamped on `account` by the last round that paid it.
    ///
    /// Returns `UnknownAccount` when the account does not exist, `Ok(None)`
    /// when it exists but was never paid.
    fn account_dividend(&self, account: &AccountId) -> Result<Option<DividendStamp>, DividendError>;
}

impl<T: LedgerStateStore + ?Sized> RoundQuery for T {
    fn current_round(&self) -> Result<DividendRound, DividendError> {
        self.dividend_round()
    }

    fn account_dividend(&self, account: &AccountId) -> Result<Option<DividendStamp>, DividendError> {
        let round = self.dividend_round()?;
        self.account(account)?
            .map(|entry| entry.last_dividend)
            .ok_or_else(|| DividendError::UnknownAccount {
                ledger_seq: round.ledger_seq,
                account: crate::domain::account_hex(account),
            })
    }
}
