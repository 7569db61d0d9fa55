//! # RocksDB Result-Map Store
//!
//! Durable content-addressed node store. Enabled with the `rocksdb` feature.
//!
//! Nodes live in a dedicated `dividend_nodes` column family keyed by their
//! Keccak-256 hash. Writes are synced by default so a committed map survives
//! a crash and the submitter can reattach to it with `ResultMap::open`.

use crate::domain::{DividendError, Hash};
use crate::ports::ResultMapStore;
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, WriteOptions, DB};
use std::path::Path;

pub const CF_DIVIDEND_NODES: &str = "dividend_nodes";

/// RocksDB-backed result-map store.
pub struct RocksDbResultMapStore {
    db: DB,
    sync_writes: bool,
}

impl RocksDbResultMapStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>, sync_writes: bool) -> Result<Self, DividendError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        let mut cf_opts = Options::default();
        cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        let descriptors = vec![ColumnFamilyDescriptor::new(CF_DIVIDEND_NODES, cf_opts)];

        let db = DB::open_cf_descriptors(&opts, path, descriptors).map_err(|e| {
            DividendError::StorageUnavailable(format!("Failed to open RocksDB: {}", e))
        })?;

        Ok(Self { db, sync_writes })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        write_opts
    }

    fn nodes_cf(&self) -> Result<&rocksdb::ColumnFamily, DividendError> {
        self.db.cf_handle(CF_DIVIDEND_NODES).ok_or_else(|| {
            DividendError::StorageUnavailable(format!("column family {CF_DIVIDEND_NODES} missing"))
        })
    }
}

impl ResultMapStore for RocksDbResultMapStore {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, DividendError> {
        let cf = self.nodes_cf()?;
        self.db.get_cf(cf, hash).map_err(|e| {
            DividendError::StorageUnavailable(format!("RocksDB get failed: {}", e))
        })
    }

    fn put_node(&self, hash: Hash, data: Vec<u8>) -> Result<(), DividendError> {
        let cf = self.nodes_cf()?;
        self.db
            .put_cf_opt(cf, hash, data, &self.write_options())
            .map_err(|e| DividendError::StorageUnavailable(format!("RocksDB put failed: {}", e)))
    }

    fn batch_put(&self, nodes: Vec<(Hash, Vec<u8>)>) -> Result<(), DividendError> {
        let cf = self.nodes_cf()?;
        let mut batch = WriteBatch::default();
        for (hash, data) in nodes {
            batch.put_cf(cf, hash, data);
        }
        self.db.write_opt(batch, &self.write_options()).map_err(|e| {
            DividendError::StorageUnavailable(format!("RocksDB batch write failed: {}", e))
        })
    }
}
