use crate::application::ledger::LedgerService;
use crate::domain::money::Amount;
use crate::error::{AllocationError, LedgerError, Result};
use serde::Deserialize;
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Customer,
    Charge,
    Payment,
    Rename,
    Delete,
}

/// One row of a ledger batch file.
///
/// Amounts stay raw text until the operation runs, so `"12,50"` can be parsed
/// with a comma as the decimal separator.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct LedgerOperation {
    pub r#type: OperationType,
    pub customer: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Error, Debug)]
pub enum OperationError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl LedgerOperation {
    fn amount(&self) -> Result<Amount> {
        match self.amount.as_deref() {
            Some(raw) => Amount::parse_localized(raw),
            None => Err(LedgerError::Validation(format!(
                "Missing amount for {:?} on '{}'",
                self.r#type, self.customer
            ))),
        }
    }

    fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Runs the operation against the ledger.
    pub async fn apply(&self, ledger: &LedgerService) -> Result<(), OperationError> {
        let customer = self.customer.as_str();
        match self.r#type {
            OperationType::Customer => {
                ledger.register_customer(customer).await?;
            }
            OperationType::Charge => {
                let amount = self.amount()?;
                ledger
                    .record_debt(customer, self.description(), amount.value())
                    .await?;
            }
            OperationType::Payment => {
                let amount = self
                    .amount()
                    .map_err(|_| AllocationError::InvalidAmount)?;
                ledger.allocate_payment(customer, amount.value()).await?;
            }
            OperationType::Rename => {
                ledger.rename_customer(customer, self.description()).await?;
            }
            OperationType::Delete => {
                ledger.delete_customer(customer).await?;
            }
        }
        Ok(())
    }
}

/// Reads ledger operations from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting rows that omit
/// trailing columns.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes operations, one row at a time.
    pub fn operations(self) -> impl Iterator<Item = Result<LedgerOperation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
