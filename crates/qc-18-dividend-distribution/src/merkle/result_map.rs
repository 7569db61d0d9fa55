//! # Result Map
//!
//! Content-addressed Patricia map from record key to canonical Apply bytes.
//! Its root hash is the round's `result_hash`.
//!
//! ## Lifecycle
//!
//! Inserts are buffered; [`ResultMap::commit`] rebuilds the trie from the
//! sorted key set and writes every node to the store. The root therefore
//! depends only on the final entry set, never on insertion order.
//!
//! Reads (`get`, `walk_after`, `proof`) traverse the committed trie through
//! the store, so a map reattached with [`ResultMap::open`] after a crash
//! behaves the same as the one that built it.

use super::nibbles::Nibbles;
use super::node::{MapNode, Step};
use crate::domain::{hash_hex, keccak256, ApplyPayout, DividendError, Hash, ZERO_HASH};
use crate::ports::ResultMapStore;
use std::collections::BTreeMap;
use tracing::debug;

/// Inclusion proof for one entry: encoded nodes from root to leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapProof {
    pub key: Hash,
    pub value: Vec<u8>,
    pub nodes: Vec<Vec<u8>>,
}

pub struct ResultMap<S> {
    store: S,
    root: Hash,
    pending: BTreeMap<Hash, Vec<u8>>,
}

impl<S: ResultMapStore> ResultMap<S> {
    /// Empty map. Its root is `ZERO_HASH`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            root: ZERO_HASH,
            pending: BTreeMap::new(),
        }
    }

    /// Reattach to a persisted map.
    pub fn open(store: S, root: Hash) -> Result<Self, DividendError> {
        if root != ZERO_HASH && store.get_node(&root)?.is_none() {
            return Err(DividendError::StorageUnavailable(format!(
                "result-map root {} not in store",
                hash_hex(&root)
            )));
        }
        Ok(Self {
            store,
            root,
            pending: BTreeMap::new(),
        })
    }

    /// Buffer an entry. A key already present, committed or pending, is rejected.
    pub fn insert(&mut self, key: Hash, value: Vec<u8>) -> Result<(), DividendError> {
        if self.pending.contains_key(&key) || self.get_committed(&key)?.is_some() {
            return Err(DividendError::DuplicateResultEntry { key: hash_hex(&key) });
        }
        self.pending.insert(key, value);
        Ok(())
    }

    /// Insert an Apply instruction under its canonical key.
    pub fn insert_payout(&mut self, apply: &ApplyPayout) -> Result<Hash, DividendError> {
        let encoded = apply.encode();
        let key = keccak256(&encoded);
        self.insert(key, encoded)?;
        Ok(key)
    }

    /// Rebuild the trie over committed and pending entries and persist it.
    pub fn commit(&mut self) -> Result<Hash, DividendError> {
        if self.pending.is_empty() {
            return Ok(self.root);
        }

        let mut entries = self.pending.clone();
        self.walk_after(None, |key, value| {
            entries.insert(*key, value.to_vec());
            Ok(true)
        })?;

        let paths: Vec<(Nibbles, &[u8])> = entries
            .iter()
            .map(|(key, value)| (Nibbles::from_key(key), value.as_slice()))
            .collect();
        let mut nodes = Vec::new();
        let root = build_subtree(&paths, 0, &mut nodes)?;
        let node_count = nodes.len();

        self.store.batch_put(nodes)?;
        self.root = root;
        self.pending.clear();

        debug!(
            entries = entries.len(),
            nodes = node_count,
            root = %hash_hex(&root),
            "Result map committed"
        );
        Ok(root)
    }

    /// Committed root hash.
    pub fn root_hash(&self) -> Hash {
        self.root
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Value stored under `key`, pending entries included.
    pub fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>, DividendError> {
        if let Some(value) = self.pending.get(key) {
            return Ok(Some(value.clone()));
        }
        self.get_committed(key)
    }

    /// Number of committed entries.
    pub fn len(&self) -> Result<usize, DividendError> {
        let mut count = 0usize;
        self.walk_after(None, |_, _| {
            count += 1;
            Ok(true)
        })?;
        Ok(count)
    }

    pub fn is_empty(&self) -> bool {
        self.root == ZERO_HASH && self.pending.is_empty()
    }

    /// Visit committed entries with key strictly greater than `after`, in
    /// ascending key order, until `visit` returns `false`.
    ///
    /// Subtrees that lie entirely at or below `after` are not loaded.
    pub fn walk_after<F>(&self, after: Option<&Hash>, mut visit: F) -> Result<(), DividendError>
    where
        F: FnMut(&Hash, &[u8]) -> Result<bool, DividendError>,
    {
        if self.root == ZERO_HASH {
            return Ok(());
        }
        let marker = after.map(Nibbles::from_key);
        let mut prefix = Nibbles::default();
        self.walk_node(self.root, &mut prefix, marker.as_ref(), &mut visit)?;
        Ok(())
    }

    fn walk_node<F>(
        &self,
        hash: Hash,
        prefix: &mut Nibbles,
        marker: Option<&Nibbles>,
        visit: &mut F,
    ) -> Result<bool, DividendError>
    where
        F: FnMut(&Hash, &[u8]) -> Result<bool, DividendError>,
    {
        if let Some(marker) = marker {
            let depth = prefix.len().min(marker.len());
            if prefix.0[..depth] < marker.0[..depth] {
                return Ok(true);
            }
        }

        match self.load(&hash)? {
            MapNode::Leaf { path, value } => {
                let mut full = prefix.clone();
                full.extend(&path);
                if marker.is_some_and(|m| full <= *m) {
                    return Ok(true);
                }
                let key = full.to_key().ok_or_else(|| {
                    DividendError::InternalGraphInvariant(format!(
                        "result-map leaf {} has a {}-nibble key",
                        hash_hex(&hash),
                        full.len()
                    ))
                })?;
                visit(&key, &value)
            }
            MapNode::Extension { path, child } => {
                let len = prefix.len();
                prefix.extend(&path);
                let more = self.walk_node(child, prefix, marker, visit)?;
                prefix.truncate(len);
                Ok(more)
            }
            MapNode::Branch { children } => {
                for (nibble, child) in children.iter().enumerate() {
                    let Some(child) = child else { continue };
                    prefix.push(nibble as u8);
                    let more = self.walk_node(*child, prefix, marker, visit)?;
                    prefix.truncate(prefix.len() - 1);
                    if !more {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Inclusion proof for a committed entry.
    pub fn proof(&self, key: &Hash) -> Result<Option<MapProof>, DividendError> {
        if self.root == ZERO_HASH {
            return Ok(None);
        }
        let path = Nibbles::from_key(key);
        let mut depth = 0usize;
        let mut current = self.root;
        let mut nodes = Vec::new();

        loop {
            let bytes = self.load_bytes(&current)?;
            let node = MapNode::decode(&bytes)?;
            nodes.push(bytes);
            match node.step(&path.slice(depth)) {
                Step::Found(value) => {
                    return Ok(Some(MapProof {
                        key: *key,
                        value: value.to_vec(),
                        nodes,
                    }))
                }
                Step::Descend { child, consumed } => {
                    depth += consumed;
                    current = child;
                }
                Step::Absent => return Ok(None),
            }
        }
    }

    fn get_committed(&self, key: &Hash) -> Result<Option<Vec<u8>>, DividendError> {
        if self.root == ZERO_HASH {
            return Ok(None);
        }
        let path = Nibbles::from_key(key);
        let mut depth = 0usize;
        let mut current = self.root;

        loop {
            let node = self.load(&current)?;
            match node.step(&path.slice(depth)) {
                Step::Found(value) => return Ok(Some(value.to_vec())),
                Step::Descend { child, consumed } => {
                    depth += consumed;
                    current = child;
                }
                Step::Absent => return Ok(None),
            }
        }
    }

    fn load_bytes(&self, hash: &Hash) -> Result<Vec<u8>, DividendError> {
        self.store.get_node(hash)?.ok_or_else(|| {
            DividendError::StorageUnavailable(format!("result-map node {} missing", hash_hex(hash)))
        })
    }

    fn load(&self, hash: &Hash) -> Result<MapNode, DividendError> {
        MapNode::decode(&self.load_bytes(hash)?)
    }
}

/// Check an inclusion proof against an agreed root.
pub fn verify_proof(root: &Hash, proof: &MapProof) -> bool {
    let path = Nibbles::from_key(&proof.key);
    let mut depth = 0usize;
    let mut expected = *root;

    for (position, bytes) in proof.nodes.iter().enumerate() {
        if keccak256(bytes) != expected {
            return false;
        }
        let Ok(node) = MapNode::decode(bytes) else {
            return false;
        };
        match node.step(&path.slice(depth)) {
            Step::Found(value) => {
                return position + 1 == proof.nodes.len() && value == proof.value.as_slice();
            }
            Step::Descend { child, consumed } => {
                depth += consumed;
                expected = child;
            }
            Step::Absent => return false,
        }
    }
    false
}

/// Build the subtree over `entries` (sorted, distinct, full-length paths)
/// whose first `depth` nibbles are shared. Encoded nodes go to `out`.
fn build_subtree(
    entries: &[(Nibbles, &[u8])],
    depth: usize,
    out: &mut Vec<(Hash, Vec<u8>)>,
) -> Result<Hash, DividendError> {
    let (first, last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (&first.0, &last.0),
        _ => return Ok(ZERO_HASH),
    };

    if entries.len() == 1 {
        return store_node(
            MapNode::Leaf {
                path: first.slice(depth),
                value: entries[0].1.to_vec(),
            },
            out,
        );
    }

    let shared = first.slice(depth).common_prefix_len(&last.slice(depth));
    if shared == 0 {
        return build_branch(entries, depth, out);
    }
    let child = build_branch(entries, depth + shared, out)?;
    store_node(
        MapNode::Extension {
            path: first.slice_range(depth, depth + shared),
            child,
        },
        out,
    )
}

fn build_branch(
    entries: &[(Nibbles, &[u8])],
    depth: usize,
    out: &mut Vec<(Hash, Vec<u8>)>,
) -> Result<Hash, DividendError> {
    let mut children: Box<[Option<Hash>; 16]> = Box::new([None; 16]);
    let mut start = 0usize;

    while start < entries.len() {
        let nibble = entries[start].0.at(depth).ok_or_else(|| {
            DividendError::InternalGraphInvariant("result-map keys are not distinct".to_string())
        })?;
        let group = entries[start..]
            .iter()
            .take_while(|(path, _)| path.at(depth) == Some(nibble))
            .count();
        let end = start + group;
        children[nibble as usize] = Some(build_subtree(&entries[start..end], depth + 1, out)?);
        start = end;
    }

    store_node(MapNode::Branch { children }, out)
}

fn store_node(node: MapNode, out: &mut Vec<(Hash, Vec<u8>)>) -> Result<Hash, DividendError> {
    let bytes = node.encode()?;
    let hash = keccak256(&bytes);
    out.push((hash, bytes));
    Ok(hash)
}
