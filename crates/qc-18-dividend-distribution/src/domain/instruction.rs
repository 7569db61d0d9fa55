//! # Round Instructions
//!
//! The three transaction kinds that drive a dividend round through the
//! ledger: Start, Apply (one per payout record) and Done.
//!
//! ## Canonical Encoding
//!
//! Fixed big-endian layout, identical on every validator:
//!
//! ```text
//! [version:1][tag:1][ledger_seq:4][body...]
//!
//! Start: total_coins:8 total_coins_vbc:8 sum_rank:8 sum_spread:8 result_hash:32
//! Apply: account:20 coin:8 vbc:8 vbc_by_rank:8 vbc_by_spread:8 rank:8 spread:8 subtree:8
//! Done:  result_hash:32
//! ```
//!
//! The encoding is the signing preimage, and for Apply its Keccak-256 hash
//! is the record's key in the result map.

use super::entities::PayoutRecord;
use super::errors::DividendError;
use super::value_objects::{keccak256, Hash, LedgerSeq};

const ENCODING_VERSION: u8 = 1;

const TAG_START: u8 = 1;
const TAG_APPLY: u8 = 2;
const TAG_DONE: u8 = 3;

/// Start a round: publish its totals and the agreed result hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartRound {
    pub ledger_seq: LedgerSeq,
    pub total_coins: u64,
    pub total_coins_vbc: u64,
    pub sum_rank: u64,
    pub sum_spread: u64,
    pub result_hash: Hash,
}

/// Credit one account with its payout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyPayout {
    pub ledger_seq: LedgerSeq,
    pub record: PayoutRecord,
}

impl ApplyPayout {
    pub fn new(ledger_seq: LedgerSeq, record: PayoutRecord) -> Self {
        Self { ledger_seq, record }
    }

    /// Canonical bytes of this instruction.
    pub fn encode(&self) -> Vec<u8> {
        RoundInstruction::Apply(self.clone()).encode()
    }

    /// Result-map key of this record.
    pub fn key(&self) -> Hash {
        keccak256(&self.encode())
    }
}

/// Close a started round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishRound {
    pub ledger_seq: LedgerSeq,
    pub result_hash: Hash,
}

/// Tagged union over the three round transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundInstruction {
    Start(StartRound),
    Apply(ApplyPayout),
    Done(FinishRound),
}

impl RoundInstruction {
    pub fn ledger_seq(&self) -> LedgerSeq {
        match self {
            RoundInstruction::Start(start) => start.ledger_seq,
            RoundInstruction::Apply(apply) => apply.ledger_seq,
            RoundInstruction::Done(done) => done.ledger_seq,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RoundInstruction::Start(_) => "start",
            RoundInstruction::Apply(_) => "apply",
            RoundInstruction::Done(_) => "done",
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(82);
        out.push(ENCODING_VERSION);
        match self {
            RoundInstruction::Start(start) => {
                out.push(TAG_START);
                out.extend_from_slice(&start.ledger_seq.to_be_bytes());
                out.extend_from_slice(&start.total_coins.to_be_bytes());
                out.extend_from_slice(&start.total_coins_vbc.to_be_bytes());
                out.extend_from_slice(&start.sum_rank.to_be_bytes());
                out.extend_from_slice(&start.sum_spread.to_be_bytes());
                out.extend_from_slice(&start.result_hash);
            }
            RoundInstruction::Apply(apply) => {
                let record = &apply.record;
                out.push(TAG_APPLY);
                out.extend_from_slice(&apply.ledger_seq.to_be_bytes());
                out.extend_from_slice(&record.account_id);
                for field in [
                    record.coin_amount,
                    record.vbc_amount,
                    record.vbc_by_rank,
                    record.vbc_by_spread,
                    record.rank,
                    record.spread,
                    record.subtree_holding,
                ] {
                    out.extend_from_slice(&field.to_be_bytes());
                }
            }
            RoundInstruction::Done(done) => {
                out.push(TAG_DONE);
                out.extend_from_slice(&done.ledger_seq.to_be_bytes());
                out.extend_from_slice(&done.result_hash);
            }
        }
        out
    }

    /// Decode canonical bytes. Any missing field is `MalformedRound`.
    pub fn decode(data: &[u8]) -> Result<Self, DividendError> {
        let mut cursor = Cursor::new(data);

        let version = cursor.u8("version")?;
        if version != ENCODING_VERSION {
            return Err(DividendError::malformed(format!(
                "unsupported encoding version {version}"
            )));
        }
        let tag = cursor.u8("tag")?;
        let ledger_seq = cursor.u32("ledger_seq")?;
        if ledger_seq == 0 {
            return Err(DividendError::malformed("ledger_seq must be non-zero"));
        }

        let instruction = match tag {
            TAG_START => RoundInstruction::Start(StartRound {
                ledger_seq,
                total_coins: cursor.u64("total_coins")?,
                total_coins_vbc: cursor.u64("total_coins_vbc")?,
                sum_rank: cursor.u64("sum_rank")?,
                sum_spread: cursor.u64("sum_spread")?,
                result_hash: cursor.array("result_hash")?,
            }),
            TAG_APPLY => RoundInstruction::Apply(ApplyPayout {
                ledger_seq,
                record: PayoutRecord {
                    account_id: cursor.array::<20>("account")?,
                    coin_amount: cursor.u64("coin_amount")?,
                    vbc_amount: cursor.u64("vbc_amount")?,
                    vbc_by_rank: cursor.u64("vbc_by_rank")?,
                    vbc_by_spread: cursor.u64("vbc_by_spread")?,
                    rank: cursor.u64("rank")?,
                    spread: cursor.u64("spread")?,
                    subtree_holding: cursor.u64("subtree_holding")?,
                },
            }),
            TAG_DONE => RoundInstruction::Done(FinishRound {
                ledger_seq,
                result_hash: cursor.array("result_hash")?,
            }),
            other => {
                return Err(DividendError::malformed(format!(
                    "unknown instruction tag {other}"
                )))
            }
        };

        cursor.finish()?;
        Ok(instruction)
    }

    /// Decode bytes that must hold an Apply instruction.
    pub fn decode_apply(data: &[u8]) -> Result<ApplyPayout, DividendError> {
        match Self::decode(data)? {
            RoundInstruction::Apply(apply) => Ok(apply),
            other => Err(DividendError::malformed(format!(
                "expected apply instruction, found {}",
                other.kind()
            ))),
        }
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], DividendError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(DividendError::malformed(format!("missing field {field}")));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &str) -> Result<[u8; N], DividendError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &str) -> Result<u8, DividendError> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &str) -> Result<u32, DividendError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &str) -> Result<u64, DividendError> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    fn finish(&self) -> Result<(), DividendError> {
        if self.pos != self.data.len() {
            return Err(DividendError::malformed(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}
