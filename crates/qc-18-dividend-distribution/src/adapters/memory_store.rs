use crate::domain::{DividendError, Hash};
use crate::ports::ResultMapStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory node store for result maps.
#[derive(Default)]
pub struct InMemoryResultMapStore {
    nodes: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl InMemoryResultMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Drop a node, simulating partial loss of a persisted map.
    pub fn remove_node(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.nodes.write().remove(hash)
    }

    /// Copy nodes from another store, as a peer would after fetching
    /// hashes reported by `missing_descendants`.
    pub fn import_from(
        &self,
        source: &dyn ResultMapStore,
        hashes: &[Hash],
    ) -> Result<usize, DividendError> {
        let mut imported = 0usize;
        for hash in hashes {
            if let Some(bytes) = source.get_node(hash)? {
                self.put_node(*hash, bytes)?;
                imported += 1;
            }
        }
        Ok(imported)
    }
}

impl ResultMapStore for InMemoryResultMapStore {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, DividendError> {
        Ok(self.nodes.read().get(hash).cloned())
    }

    fn put_node(&self, hash: Hash, data: Vec<u8>) -> Result<(), DividendError> {
        self.nodes.write().insert(hash, data);
        Ok(())
    }

    fn batch_put(&self, batch: Vec<(Hash, Vec<u8>)>) -> Result<(), DividendError> {
        let mut nodes = self.nodes.write();
        for (hash, data) in batch {
            nodes.insert(hash, data);
        }
        Ok(())
    }
}
