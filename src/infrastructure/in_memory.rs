use super::sync::{CustomerLocks, Sequence};
use super::unit_of_work::{ChangeSet, ChangeSink, UnitOfWork};
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::debt::{
    DebtItem, DebtItemId, Payment, PaymentId, SettledItem, outstanding_total, sort_fifo,
};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{LedgerStore, LedgerTransactionBox};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerTables {
    customers: BTreeMap<CustomerId, Customer>,
    items: BTreeMap<DebtItemId, DebtItem>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl LedgerTables {
    fn items_of(&self, customer_id: CustomerId) -> impl Iterator<Item = &DebtItem> {
        self.items
            .values()
            .filter(move |item| item.customer_id == customer_id)
    }

    /// Drops a settled-up customer together with its items and payments.
    fn remove_customer(&mut self, id: CustomerId) -> Result<()> {
        if !self.customers.contains_key(&id) {
            return Err(LedgerError::CustomerNotFound(id.into()));
        }
        if self.items_of(id).any(DebtItem::is_outstanding) {
            return Err(LedgerError::HasOutstandingDebt(id));
        }
        self.items.retain(|_, item| item.customer_id != id);
        self.payments.retain(|_, payment| payment.customer_id != id);
        self.customers.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    tables: RwLock<LedgerTables>,
    locks: CustomerLocks,
    customer_ids: Sequence,
    item_ids: Sequence,
    payment_ids: Sequence,
}

#[async_trait]
impl ChangeSink for Inner {
    fn next_payment_id(&self) -> PaymentId {
        PaymentId(self.payment_ids.next())
    }

    async fn apply(&self, changes: ChangeSet) -> Result<()> {
        let mut tables = self.tables.write().await;

        // Validate everything before the first write so a failure leaves no trace.
        for item in &changes.items {
            if !tables.items.contains_key(&item.id) {
                return Err(LedgerError::Storage(format!(
                    "Debt item {} vanished before commit",
                    item.id
                )));
            }
        }

        for payment in changes.payments {
            tables.payments.insert(payment.id, payment);
        }
        for item in changes.items {
            tables.items.insert(item.id, item);
        }
        Ok(())
    }
}

/// A thread-safe in-memory ledger.
///
/// Tables live behind one `RwLock`; per-customer locks serialize writes to a
/// customer's tab. Ideal for tests or a single CLI run.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<Inner>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_customer(&self, name: &str) -> Result<Customer> {
        let mut tables = self.inner.tables.write().await;
        if tables.customers.values().any(|c| c.name == name) {
            return Err(LedgerError::DuplicateName(name.to_string()));
        }
        let customer = Customer::new(CustomerId(self.inner.customer_ids.next()), name.to_string());
        tables.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let tables = self.inner.tables.read().await;
        Ok(tables.customers.get(&id).cloned())
    }

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        let tables = self.inner.tables.read().await;
        Ok(tables.customers.values().find(|c| c.name == name).cloned())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let tables = self.inner.tables.read().await;
        let mut customers: Vec<Customer> = tables.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn rename_customer(&self, id: CustomerId, name: &str) -> Result<Customer> {
        let mut tables = self.inner.tables.write().await;
        if tables.customers.values().any(|c| c.name == name && c.id != id) {
            return Err(LedgerError::DuplicateName(name.to_string()));
        }
        let customer = tables
            .customers
            .get_mut(&id)
            .ok_or(LedgerError::CustomerNotFound(id.into()))?;
        customer.name = name.to_string();
        Ok(customer.clone())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let removed = {
            let _guard = self.inner.locks.acquire(id).await;
            let mut tables = self.inner.tables.write().await;
            tables.remove_customer(id)
        };
        self.inner.locks.release(id).await;
        removed
    }

    async fn create_debt_item(
        &self,
        customer_id: CustomerId,
        description: &str,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Result<DebtItem> {
        let _guard = self.inner.locks.acquire(customer_id).await;
        let mut tables = self.inner.tables.write().await;
        if !tables.customers.contains_key(&customer_id) {
            return Err(LedgerError::CustomerNotFound(customer_id.into()));
        }
        let item = DebtItem {
            id: DebtItemId(self.inner.item_ids.next()),
            customer_id,
            description: description.to_string(),
            amount,
            created_at,
            settled_by: None,
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn delete_debt_item(&self, item_id: DebtItemId) -> Result<CustomerId> {
        let customer_id = {
            let tables = self.inner.tables.read().await;
            tables
                .items
                .get(&item_id)
                .map(|item| item.customer_id)
                .ok_or_else(|| LedgerError::NotFound(format!("Debt item {}", item_id)))?
        };
        let _guard = self.inner.locks.acquire(customer_id).await;
        let mut tables = self.inner.tables.write().await;
        tables
            .items
            .remove(&item_id)
            .ok_or_else(|| LedgerError::NotFound(format!("Debt item {}", item_id)))?;
        Ok(customer_id)
    }

    async fn list_outstanding(&self, customer_id: CustomerId) -> Result<Vec<DebtItem>> {
        let tables = self.inner.tables.read().await;
        let mut items: Vec<DebtItem> = tables
            .items_of(customer_id)
            .filter(|item| item.is_outstanding())
            .cloned()
            .collect();
        sort_fifo(&mut items);
        Ok(items)
    }

    async fn sum_outstanding(&self, customer_id: CustomerId) -> Result<Money> {
        let tables = self.inner.tables.read().await;
        outstanding_total(tables.items_of(customer_id))
    }

    async fn list_settled(&self, customer_id: CustomerId) -> Result<Vec<SettledItem>> {
        let tables = self.inner.tables.read().await;
        let mut settled: Vec<SettledItem> = tables
            .items_of(customer_id)
            .filter_map(|item| {
                let payment = tables.payments.get(&item.settled_by?)?;
                Some(SettledItem {
                    item_id: item.id,
                    description: item.description.clone(),
                    amount: item.amount,
                    payment_id: payment.id,
                    paid_at: payment.paid_at,
                })
            })
            .collect();
        settled.sort_by(|a, b| (b.paid_at, b.item_id).cmp(&(a.paid_at, a.item_id)));
        Ok(settled)
    }

    async fn list_payments(&self, customer_id: CustomerId) -> Result<Vec<Payment>> {
        let tables = self.inner.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| (b.paid_at, b.id).cmp(&(a.paid_at, a.id)));
        Ok(payments)
    }

    async fn begin(&self, customer_id: CustomerId) -> Result<LedgerTransactionBox> {
        let guard = self.inner.locks.acquire(customer_id).await;
        let outstanding = {
            let tables = self.inner.tables.read().await;
            if !tables.customers.contains_key(&customer_id) {
                return Err(LedgerError::CustomerNotFound(customer_id.into()));
            }
            tables
                .items_of(customer_id)
                .filter(|item| item.is_outstanding())
                .cloned()
                .collect()
        };
        let sink: Arc<dyn ChangeSink> = self.inner.clone();
        Ok(Box::new(UnitOfWork::new(
            customer_id,
            outstanding,
            sink,
            guard,
        )))
    }
}
