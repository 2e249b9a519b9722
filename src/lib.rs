//! Store-credit ("fiado") ledger.
//!
//! Tracks customers, the debt items on their tab and the payments they make.
//! Payments are allocated oldest item first by
//! [`application::allocator::PaymentAllocator`], atomically per customer.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
