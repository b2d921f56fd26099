//! Storage backends and collaborator implementations. The in-memory store
//! is the reference implementation of the atomic commit semantics; the
//! RocksDB store (feature `storage-rocksdb`) persists the same layout.

pub mod directory;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
