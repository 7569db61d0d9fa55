//! Round state machine
//!
//! Ledger-side application of round instructions. Runs inside the ledger's
//! single-threaded apply path: each call reads the current state, validates
//! the transition and commits all of its writes in one `LedgerChanges`. A
//! rejected instruction commits nothing.

use crate::algorithms::math::checked_add;
use crate::config::DividendConfig;
use crate::domain::{
    account_hex, hash_hex, ApplyPayout, ControllerKey, DividendError, DividendRound,
    FinishRound, LedgerChanges, RoundInstruction, RoundState, SignedInstruction, StartRound,
    ZERO_HASH,
};
use crate::ports::LedgerStateStore;
use tracing::{debug, info, warn};

pub struct RoundStateMachine<L> {
    ledger: L,
    controller: Option<ControllerKey>,
}

impl<L: LedgerStateStore> RoundStateMachine<L> {
    pub fn new(ledger: L, controller: Option<ControllerKey>) -> Self {
        Self { ledger, controller }
    }

    pub fn from_config(ledger: L, config: &DividendConfig) -> Result<Self, DividendError> {
        Ok(Self::new(ledger, config.controller_key()?))
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Authorize and apply one instruction. Returns the resulting round state.
    pub fn apply(&self, signed: &SignedInstruction) -> Result<RoundState, DividendError> {
        let instruction = &signed.instruction;
        let result = self
            .authorize(signed)
            .and_then(|()| self.transition(instruction));

        if let Err(error) = &result {
            warn!(
                kind = instruction.kind(),
                ledger_seq = instruction.ledger_seq(),
                %error,
                "Rejected round instruction"
            );
        }
        result
    }

    fn authorize(&self, signed: &SignedInstruction) -> Result<(), DividendError> {
        match &self.controller {
            Some(key) => key.verify(signed),
            None => Err(DividendError::Unauthorized(
                "no round-controller key configured".into(),
            )),
        }
    }

    fn transition(&self, instruction: &RoundInstruction) -> Result<RoundState, DividendError> {
        let current = self.ledger.dividend_round()?;

        let changes = match instruction {
            RoundInstruction::Start(start) => start_round(&current, start)?,
            RoundInstruction::Apply(apply) => self.apply_payout(&current, apply)?,
            RoundInstruction::Done(done) => finish_round(&current, done)?,
        };
        let state = changes
            .round
            .as_ref()
            .map_or(current.state, |round| round.state);

        self.ledger.commit(changes)?;
        Ok(state)
    }

    fn apply_payout(
        &self,
        current: &DividendRound,
        apply: &ApplyPayout,
    ) -> Result<LedgerChanges, DividendError> {
        let seq = apply.ledger_seq;
        if current.state != RoundState::Started {
            return Err(DividendError::conflict(
                seq,
                format!("apply requires a started round, current state is {}", current.state),
            ));
        }
        if seq != current.ledger_seq {
            return Err(DividendError::conflict(
                seq,
                format!("apply targets round {} but round {} is started", seq, current.ledger_seq),
            ));
        }

        let record = &apply.record;
        let mut account = self
            .ledger
            .account(&record.account_id)?
            .ok_or_else(|| DividendError::UnknownAccount {
                ledger_seq: seq,
                account: record.account_hex(),
            })?;
        if account.is_stamped_for(seq) {
            return Err(DividendError::DuplicateApplication {
                ledger_seq: seq,
                account: record.account_hex(),
            });
        }

        account.coin_balance = checked_add(account.coin_balance, record.coin_amount, "coin balance")?;
        account.vbc_balance = checked_add(account.vbc_balance, record.vbc_amount, "vbc balance")?;
        account.last_dividend = Some(record.stamp(seq));

        let key = apply.key();
        let mut round = current.clone();
        if key > round.resume_marker {
            round.resume_marker = key;
        }

        debug!(
            ledger_seq = seq,
            account = %account_hex(&account.account_id),
            coin = record.coin_amount,
            vbc = record.vbc_amount,
            "Dividend applied"
        );

        Ok(LedgerChanges {
            round: Some(round),
            accounts: vec![account],
        })
    }
}

fn start_round(current: &DividendRound, start: &StartRound) -> Result<LedgerChanges, DividendError> {
    let seq = start.ledger_seq;
    if seq == 0 {
        return Err(DividendError::malformed("start requires a non-zero ledger sequence"));
    }
    if current.state == RoundState::Started {
        return Err(DividendError::conflict(
            seq,
            format!("round {} is still in progress", current.ledger_seq),
        ));
    }
    if seq <= current.ledger_seq {
        return Err(DividendError::conflict(
            seq,
            format!("round {} is not newer than round {}", seq, current.ledger_seq),
        ));
    }

    info!(
        ledger_seq = seq,
        total_coins = start.total_coins,
        total_coins_vbc = start.total_coins_vbc,
        result_hash = %hash_hex(&start.result_hash),
        "Dividend round started"
    );

    Ok(LedgerChanges {
        round: Some(DividendRound {
            state: RoundState::Started,
            ledger_seq: seq,
            total_coins: start.total_coins,
            total_coins_vbc: start.total_coins_vbc,
            sum_rank: start.sum_rank,
            sum_spread: start.sum_spread,
            result_hash: start.result_hash,
            resume_marker: ZERO_HASH,
        }),
        accounts: Vec::new(),
    })
}

fn finish_round(current: &DividendRound, done: &FinishRound) -> Result<LedgerChanges, DividendError> {
    let seq = done.ledger_seq;
    if current.state != RoundState::Started {
        return Err(DividendError::conflict(
            seq,
            format!("done requires a started round, current state is {}", current.state),
        ));
    }
    if seq != current.ledger_seq {
        return Err(DividendError::conflict(
            seq,
            format!("done targets round {} but round {} is started", seq, current.ledger_seq),
        ));
    }
    if done.result_hash != current.result_hash {
        return Err(DividendError::conflict(
            seq,
            format!(
                "result hash {} does not match started round {}",
                hash_hex(&done.result_hash),
                hash_hex(&current.result_hash)
            ),
        ));
    }

    info!(
        ledger_seq = seq,
        result_hash = %hash_hex(&done.result_hash),
        "Dividend round done"
    );

    let mut round = current.clone();
    round.state = RoundState::Done;
    Ok(LedgerChanges {
        round: Some(round),
        accounts: Vec::new(),
    })
}
