use super::customer::CustomerId;
use super::money::{Amount, Money};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DebtItemId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PaymentId(pub u64);

impl fmt::Display for DebtItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One charge on a customer's tab.
///
/// While `settled_by` is `None` the item is outstanding and counts towards the
/// customer's debt. Once set it points at the payment that closed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtItem {
    pub id: DebtItemId,
    pub customer_id: CustomerId,
    pub description: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_by: Option<PaymentId>,
}

impl DebtItem {
    pub fn is_outstanding(&self) -> bool {
        self.settled_by.is_none()
    }

    /// Key that puts the oldest item first. Items created at the same instant
    /// keep insertion order.
    pub fn fifo_key(&self) -> (DateTime<Utc>, DebtItemId) {
        (self.created_at, self.id)
    }
}

/// A payment received from a customer. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub customer_id: CustomerId,
    pub amount: Amount,
    pub paid_at: DateTime<Utc>,
}

/// A settled debt item joined with the time of the payment that settled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledItem {
    pub item_id: DebtItemId,
    pub description: String,
    pub amount: Amount,
    pub payment_id: PaymentId,
    pub paid_at: DateTime<Utc>,
}

/// Sorts items oldest first.
pub fn sort_fifo(items: &mut [DebtItem]) {
    items.sort_by_key(DebtItem::fifo_key);
}

/// Sum of the outstanding items in `items`.
pub fn outstanding_total<'a>(
    items: impl IntoIterator<Item = &'a DebtItem>,
) -> Result<Money, LedgerError> {
    Money::try_sum(
        items
            .into_iter()
            .filter(|item| item.is_outstanding())
            .map(|item| Money::from(item.amount)),
    )
}

/// Trims a debt description and rejects it when nothing is left.
pub fn normalize_description(description: &str) -> Result<String, LedgerError> {
    let description = description.trim();
    if description.is_empty() {
        Err(LedgerError::Validation(
            "Description cannot be empty".to_string(),
        ))
    } else {
        Ok(description.to_string())
    }
}
