//! Adapters between the ledger and external formats.

pub mod csv;
