//! Application layer containing the ledger's business logic orchestration.
//!
//! `PaymentAllocator` applies payments to a customer's outstanding debt in
//! FIFO order inside one store transaction. `LedgerService` is the entry point
//! for everything else a caller needs: customers, charges and statements.

pub mod allocator;
pub mod ledger;
