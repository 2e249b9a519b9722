use super::customer::{Customer, CustomerId};
use super::debt::{DebtItem, DebtItemId, Payment, PaymentId, SettledItem};
use super::money::{Amount, Money};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persistence port for customers, debt items and payments.
///
/// Every write that touches a customer's debt items is serialized on that
/// customer, so a [`LedgerTransaction`] never races a concurrent write to the
/// same tab.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a customer. Fails with `DuplicateName` if the name is taken.
    async fn insert_customer(&self, name: &str) -> Result<Customer>;
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;
    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>>;
    /// All customers ordered by name.
    async fn list_customers(&self) -> Result<Vec<Customer>>;
    async fn rename_customer(&self, id: CustomerId, name: &str) -> Result<Customer>;
    /// Removes a customer with its settled items and payments.
    ///
    /// Fails with `HasOutstandingDebt` while any outstanding item exists.
    async fn delete_customer(&self, id: CustomerId) -> Result<()>;

    async fn create_debt_item(
        &self,
        customer_id: CustomerId,
        description: &str,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Result<DebtItem>;
    /// Removes a single item and returns the customer it belonged to.
    async fn delete_debt_item(&self, item_id: DebtItemId) -> Result<CustomerId>;

    /// Outstanding items, oldest first.
    async fn list_outstanding(&self, customer_id: CustomerId) -> Result<Vec<DebtItem>>;
    async fn sum_outstanding(&self, customer_id: CustomerId) -> Result<Money>;
    /// Settled items, most recently paid first.
    async fn list_settled(&self, customer_id: CustomerId) -> Result<Vec<SettledItem>>;
    /// Payments, most recent first.
    async fn list_payments(&self, customer_id: CustomerId) -> Result<Vec<Payment>>;

    /// Opens a unit of work scoped to one customer.
    ///
    /// The customer stays locked until the transaction is committed or dropped.
    /// Dropping it without calling `commit` discards every staged write.
    async fn begin(&self, customer_id: CustomerId) -> Result<LedgerTransactionBox>;
}

/// Writes staged against one customer's tab, applied all at once on commit.
#[async_trait]
pub trait LedgerTransaction: Send {
    fn customer_id(&self) -> CustomerId;
    /// Outstanding items as seen by this transaction, oldest first.
    async fn list_outstanding(&mut self) -> Result<Vec<DebtItem>>;
    async fn sum_outstanding(&mut self) -> Result<Money>;
    async fn create_payment(&mut self, amount: Amount, paid_at: DateTime<Utc>) -> Result<PaymentId>;
    /// Marks an item as fully paid by `payment_id`.
    async fn settle_item(&mut self, item_id: DebtItemId, payment_id: PaymentId) -> Result<()>;
    /// Lowers an item's amount. The item stays outstanding.
    async fn reduce_item(&mut self, item_id: DebtItemId, new_amount: Amount) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type LedgerTransactionBox = Box<dyn LedgerTransaction>;
