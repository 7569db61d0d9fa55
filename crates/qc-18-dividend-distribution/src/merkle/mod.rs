//! Merkle-indexed result map.

pub mod nibbles;
pub mod node;
pub mod result_map;

pub use nibbles::Nibbles;
pub use node::MapNode;
pub use result_map::{verify_proof, MapProof, ResultMap};
