use crate::domain::customer::CustomerId;
use crate::domain::debt::{DebtItem, DebtItemId, Payment, PaymentId, outstanding_total, sort_fifo};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::LedgerTransaction;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Writes collected by a [`UnitOfWork`], handed to the backend in one piece.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    pub payments: Vec<Payment>,
    pub items: Vec<DebtItem>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.payments.is_empty() && self.items.is_empty()
    }
}

/// Backend side of a unit of work.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    fn next_payment_id(&self) -> PaymentId;
    /// Applies every change or none of them.
    async fn apply(&self, changes: ChangeSet) -> Result<()>;
}

/// A [`LedgerTransaction`] over a private copy of one customer's outstanding
/// items.
///
/// The customer's lock is held for the whole lifetime of the value, so the copy
/// cannot go stale. Writes only touch the copy until `commit`.
pub struct UnitOfWork {
    customer_id: CustomerId,
    sink: Arc<dyn ChangeSink>,
    items: Vec<DebtItem>,
    changes: ChangeSet,
    _guard: OwnedMutexGuard<()>,
}

impl UnitOfWork {
    pub fn new(
        customer_id: CustomerId,
        mut outstanding: Vec<DebtItem>,
        sink: Arc<dyn ChangeSink>,
        guard: OwnedMutexGuard<()>,
    ) -> Self {
        sort_fifo(&mut outstanding);
        Self {
            customer_id,
            sink,
            items: outstanding,
            changes: ChangeSet::default(),
            _guard: guard,
        }
    }

    fn outstanding_item_mut(&mut self, item_id: DebtItemId) -> Result<&mut DebtItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id && item.is_outstanding())
            .ok_or_else(|| LedgerError::NotFound(format!("Outstanding debt item {}", item_id)))
    }

    fn stage_item(&mut self, item: DebtItem) {
        match self.changes.items.iter_mut().find(|staged| staged.id == item.id) {
            Some(staged) => *staged = item,
            None => self.changes.items.push(item),
        }
    }
}

#[async_trait]
impl LedgerTransaction for UnitOfWork {
    fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    async fn list_outstanding(&mut self) -> Result<Vec<DebtItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| item.is_outstanding())
            .cloned()
            .collect())
    }

    async fn sum_outstanding(&mut self) -> Result<Money> {
        outstanding_total(&self.items)
    }

    async fn create_payment(
        &mut self,
        amount: Amount,
        paid_at: DateTime<Utc>,
    ) -> Result<PaymentId> {
        let id = self.sink.next_payment_id();
        self.changes.payments.push(Payment {
            id,
            customer_id: self.customer_id,
            amount,
            paid_at,
        });
        Ok(id)
    }

    async fn settle_item(&mut self, item_id: DebtItemId, payment_id: PaymentId) -> Result<()> {
        if !self.changes.payments.iter().any(|p| p.id == payment_id) {
            return Err(LedgerError::NotFound(format!("Payment {}", payment_id)));
        }
        let item = self.outstanding_item_mut(item_id)?;
        item.settled_by = Some(payment_id);
        let item = item.clone();
        self.stage_item(item);
        Ok(())
    }

    async fn reduce_item(&mut self, item_id: DebtItemId, new_amount: Amount) -> Result<()> {
        let item = self.outstanding_item_mut(item_id)?;
        if new_amount >= item.amount {
            return Err(LedgerError::Validation(format!(
                "Reduced amount {} must be below the current amount {}",
                new_amount, item.amount
            )));
        }
        item.amount = new_amount;
        let item = item.clone();
        self.stage_item(item);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let UnitOfWork {
            sink,
            changes,
            _guard,
            ..
        } = *self;
        if changes.is_empty() {
            return Ok(());
        }
        // The customer stays locked until the backend has applied the writes.
        sink.apply(changes).await
    }
}
