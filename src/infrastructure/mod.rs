//! Storage backends for the ledger.
//!
//! `in_memory` is always available; `rocksdb` is compiled in with the
//! `storage-rocksdb` feature.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod sync;
pub mod unit_of_work;
