use crate::domain::Hash;
use serde::{Deserialize, Serialize};

/// Number of nibbles in a full result-map key.
pub const KEY_NIBBLES: usize = 64;

/// Half-byte path through the result map.
///
/// Every key is a 32-byte hash, so a full path is always 64 nibbles and no
/// key is a prefix of another.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nibbles(pub Vec<u8>);

impl Nibbles {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Nibbles(nibbles)
    }

    pub fn from_key(key: &Hash) -> Self {
        Self::from_bytes(key)
    }

    /// Pack a full 64-nibble path back into a key.
    pub fn to_key(&self) -> Option<Hash> {
        if self.0.len() != KEY_NIBBLES {
            return None;
        }
        let mut key = [0u8; 32];
        for (byte, pair) in key.iter_mut().zip(self.0.chunks(2)) {
            *byte = (pair[0] << 4) | pair[1];
        }
        Some(key)
    }

    pub fn slice(&self, start: usize) -> Self {
        Nibbles(self.0[start.min(self.0.len())..].to_vec())
    }

    pub fn slice_range(&self, start: usize, end: usize) -> Self {
        Nibbles(self.0[start..end].to_vec())
    }

    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn starts_with(&self, prefix: &Nibbles) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn extend(&mut self, other: &Nibbles) {
        self.0.extend_from_slice(&other.0);
    }

    pub fn push(&mut self, nibble: u8) {
        self.0.push(nibble);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_from_key() {
        let mut key = [0u8; 32];
        key[0] = 0xAB;
        key[31] = 0x0F;

        let nibbles = Nibbles::from_key(&key);

        assert_eq!(nibbles.len(), KEY_NIBBLES);
        assert_eq!(nibbles.at(0), Some(0x0A));
        assert_eq!(nibbles.at(1), Some(0x0B));
        assert_eq!(nibbles.at(63), Some(0x0F));
        assert_eq!(nibbles.at(64), None);
        assert_eq!(nibbles.to_key(), Some(key));
    }

    #[test]
    fn test_partial_path_is_not_a_key() {
        assert_eq!(Nibbles(vec![1, 2, 3]).to_key(), None);
    }

    #[test]
    fn test_common_prefix() {
        let a = Nibbles(vec![1, 2, 3, 4]);
        let b = Nibbles(vec![1, 2, 9]);
        assert_eq!(a.common_prefix_len(&b), 2);
        assert!(a.starts_with(&a.slice_range(0, 2)));
        assert_eq!(a.slice(3), Nibbles(vec![4]));
    }
}
