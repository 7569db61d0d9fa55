//! Value objects shared by every dividend component.

use sha3::{Digest, Keccak256};

/// 32-byte Keccak-256 digest.
pub type Hash = [u8; 32];

/// 20-byte account identifier.
pub type AccountId = [u8; 20];

/// Ledger sequence number that keys a dividend round.
pub type LedgerSeq = u32;

/// All-zero hash. Used as the root of an empty result map and as the
/// initial resume marker.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Dense index of a node inside the reference forest arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Compute Keccak256 hash.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hex rendering used in logs and error messages.
pub fn account_hex(account: &AccountId) -> String {
    hex::encode(account)
}

/// Hex rendering of a hash.
pub fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash)
}
