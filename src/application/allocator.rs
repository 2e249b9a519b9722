use crate::domain::customer::{CustomerId, CustomerRef};
use crate::domain::debt::{DebtItemId, PaymentId};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{LedgerStore, LedgerTransactionBox};
use crate::error::{AllocationError, LedgerError};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rust_decimal::Decimal;

/// What a committed payment did to the customer's tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub payment_id: PaymentId,
    pub customer_id: CustomerId,
    pub amount: Amount,
    /// Items fully paid by this payment, oldest first.
    pub settled: Vec<DebtItemId>,
    /// The item that was only partly covered, with what is still owed on it.
    pub reduced: Option<(DebtItemId, Amount)>,
}

/// Applies payments against a customer's outstanding debt, oldest item first.
///
/// The allocator borrows the store for the duration of a call and opens one
/// transaction per payment. The overpayment check, the payment row and every
/// settlement commit together, or the transaction is dropped and nothing is
/// written.
pub struct PaymentAllocator<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> PaymentAllocator<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    /// Records a payment made now.
    pub async fn allocate_payment(
        &self,
        customer: impl Into<CustomerRef>,
        amount: Decimal,
    ) -> Result<Allocation, AllocationError> {
        self.allocate_payment_at(customer, amount, Utc::now()).await
    }

    pub async fn allocate_payment_at(
        &self,
        customer: impl Into<CustomerRef>,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<Allocation, AllocationError> {
        let amount = Amount::new(amount).map_err(|_| AllocationError::InvalidAmount)?;
        let customer_id = self.resolve(customer.into()).await?;

        let mut tx = match self.store.begin(customer_id).await {
            Ok(tx) => tx,
            Err(LedgerError::CustomerNotFound(_)) => return Err(AllocationError::CustomerNotFound),
            Err(e) => return Err(internal(customer_id, e)),
        };

        let outstanding = tx
            .sum_outstanding()
            .await
            .map_err(|e| internal(customer_id, e))?;
        let attempted = Money::from(amount);
        if attempted > outstanding {
            warn!(
                "Rejected payment of {} for customer {}: only {} outstanding",
                attempted, customer_id, outstanding
            );
            return Err(AllocationError::Overpayment {
                attempted,
                outstanding,
            });
        }

        let allocation = settle_fifo(&mut tx, customer_id, amount, paid_at)
            .await
            .map_err(|e| internal(customer_id, e))?;
        tx.commit().await.map_err(|e| internal(customer_id, e))?;

        info!(
            "Payment {} of {} for customer {} settled {} item(s)",
            allocation.payment_id,
            amount,
            customer_id,
            allocation.settled.len()
        );
        Ok(allocation)
    }

    async fn resolve(&self, customer: CustomerRef) -> Result<CustomerId, AllocationError> {
        let found = match &customer {
            CustomerRef::Id(id) => self.store.get_customer(*id).await,
            CustomerRef::Name(name) => self.store.find_customer_by_name(name.trim()).await,
        };
        match found {
            Ok(Some(customer)) => Ok(customer.id),
            Ok(None) => Err(AllocationError::CustomerNotFound),
            Err(e) => {
                error!("Failed to look up customer {}: {}", customer, e);
                Err(AllocationError::Internal(e))
            }
        }
    }
}

fn internal(customer_id: CustomerId, e: LedgerError) -> AllocationError {
    error!("Payment for customer {} rolled back: {}", customer_id, e);
    AllocationError::Internal(e)
}

/// Stages the payment and walks the outstanding items oldest first.
///
/// An item is fully settled when the remainder covers it exactly or more; a
/// smaller remainder lowers the item's amount and ends the walk.
async fn settle_fifo(
    tx: &mut LedgerTransactionBox,
    customer_id: CustomerId,
    amount: Amount,
    paid_at: DateTime<Utc>,
) -> Result<Allocation, LedgerError> {
    let payment_id = tx.create_payment(amount, paid_at).await?;
    let items = tx.list_outstanding().await?;

    let mut allocation = Allocation {
        payment_id,
        customer_id,
        amount,
        settled: Vec::new(),
        reduced: None,
    };
    let mut remaining = Money::from(amount);

    for item in items {
        if !remaining.is_positive() {
            break;
        }
        let owed = Money::from(item.amount);
        if remaining >= owed {
            tx.settle_item(item.id, payment_id).await?;
            remaining -= owed;
            debug!("Item {} settled by payment {}", item.id, payment_id);
            allocation.settled.push(item.id);
        } else {
            let left = Amount::try_from(owed - remaining)?;
            tx.reduce_item(item.id, left).await?;
            debug!("Item {} reduced to {} by payment {}", item.id, left, payment_id);
            allocation.reduced = Some((item.id, left));
            break;
        }
    }

    Ok(allocation)
}
