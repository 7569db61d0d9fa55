//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-memory ledger and node store, the local transaction sink and the
//! optional RocksDB node store.

mod ledger;
mod memory_store;
mod sink;

#[cfg(feature = "rocksdb")]
mod rocksdb_store;

pub use ledger::{InMemoryLedger, LedgerSnapshot};
pub use memory_store::InMemoryResultMapStore;
pub use sink::DirectLedgerSink;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbResultMapStore, CF_DIVIDEND_NODES};
