use super::nibbles::Nibbles;
use crate::domain::{keccak256, DividendError, Hash};
use serde::{Deserialize, Serialize};

// =============================================================================
// MAP NODE: content-addressed Patricia node
// =============================================================================

/// Node of the result map.
///
/// Keys are fixed-length hashes, so a branch never terminates a key and
/// carries no value of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapNode {
    /// Remaining key path and the stored record.
    Leaf { path: Nibbles, value: Vec<u8> },
    /// Shared prefix with a single child.
    Extension { path: Nibbles, child: Hash },
    /// 16-way fan-out on the next nibble.
    Branch { children: Box<[Option<Hash>; 16]> },
}

/// Result of following a key through one node.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<'a> {
    /// Continue at `child`, `consumed` nibbles further down the key.
    Descend { child: Hash, consumed: usize },
    /// The key ends at this leaf.
    Found(&'a [u8]),
    /// The key is not in the map.
    Absent,
}

impl MapNode {
    /// Canonical bytes. The node hash is Keccak-256 over these.
    pub fn encode(&self) -> Result<Vec<u8>, DividendError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DividendError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn hash(&self) -> Result<Hash, DividendError> {
        Ok(keccak256(&self.encode()?))
    }

    /// Hashes of directly referenced nodes.
    pub fn child_hashes(&self) -> Vec<Hash> {
        match self {
            MapNode::Leaf { .. } => Vec::new(),
            MapNode::Extension { child, .. } => vec![*child],
            MapNode::Branch { children } => children.iter().flatten().copied().collect(),
        }
    }

    /// Follow `remaining` (the unconsumed part of a key) through this node.
    pub fn step<'a>(&'a self, remaining: &Nibbles) -> Step<'a> {
        match self {
            MapNode::Leaf { path, value } => {
                if path == remaining {
                    Step::Found(value)
                } else {
                    Step::Absent
                }
            }
            MapNode::Extension { path, child } => {
                if remaining.starts_with(path) {
                    Step::Descend {
                        child: *child,
                        consumed: path.len(),
                    }
                } else {
                    Step::Absent
                }
            }
            MapNode::Branch { children } => match remaining.at(0) {
                Some(nibble) => match children[nibble as usize] {
                    Some(child) => Step::Descend { child, consumed: 1 },
                    None => Step::Absent,
                },
                None => Step::Absent,
            },
        }
    }
}
