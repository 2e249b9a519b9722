use crate::domain::customer::{CustomerId, CustomerRef};
use crate::domain::money::Money;
use miette::Diagnostic;
use thiserror::Error;

/// Failures raised by the ledger store and the bookkeeping operations around it.
#[derive(Error, Debug, Diagnostic)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(fiado::validation))]
    Validation(String),

    #[error("A customer named '{0}' already exists")]
    #[diagnostic(code(fiado::duplicate_name))]
    DuplicateName(String),

    #[error("Customer {0} not found")]
    #[diagnostic(code(fiado::customer_not_found))]
    CustomerNotFound(CustomerRef),

    #[error("{0} not found")]
    #[diagnostic(code(fiado::not_found))]
    NotFound(String),

    #[error("Customer {0} still has outstanding debt and cannot be deleted")]
    #[diagnostic(
        code(fiado::has_outstanding_debt),
        help("settle every outstanding item before deleting the customer")
    )]
    HasOutstandingDebt(CustomerId),

    #[error("Storage error: {0}")]
    #[diagnostic(code(fiado::storage))]
    Storage(String),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(fiado::serialization))]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(fiado::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(fiado::io))]
    Io(#[from] std::io::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    #[diagnostic(code(fiado::rocksdb))]
    RocksDB(#[from] rocksdb::Error),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Outcome of a rejected payment allocation.
///
/// Every variant leaves the store exactly as it was before the call.
#[derive(Error, Debug, Diagnostic)]
pub enum AllocationError {
    #[error("Payment amount must be a positive number")]
    #[diagnostic(code(fiado::invalid_amount), help("use a value such as 12,50"))]
    InvalidAmount,

    #[error("Customer not found")]
    #[diagnostic(code(fiado::customer_not_found))]
    CustomerNotFound,

    #[error("Payment (R$ {attempted:.2}) is greater than the total owed (R$ {outstanding:.2})")]
    #[diagnostic(code(fiado::overpayment))]
    Overpayment { attempted: Money, outstanding: Money },

    #[error("The payment could not be processed")]
    #[diagnostic(code(fiado::internal))]
    Internal(#[from] LedgerError),
}
