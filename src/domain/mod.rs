//! Domain layer: money, customers, debt items, payments and the storage ports.

pub mod customer;
pub mod debt;
pub mod money;
pub mod ports;
