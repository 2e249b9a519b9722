use super::allocator::{Allocation, PaymentAllocator};
use crate::domain::customer::{Customer, CustomerId, CustomerRef, normalize_name};
use crate::domain::debt::{
    DebtItem, DebtItemId, Payment, SettledItem, normalize_description, outstanding_total,
};
use crate::domain::money::{Amount, Money};
use crate::domain::ports::{LedgerStore, LedgerStoreBox};
use crate::error::{AllocationError, LedgerError, Result};
use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;

/// Everything a customer's page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerStatement {
    pub customer: Customer,
    /// Outstanding items, newest first.
    pub outstanding: Vec<DebtItem>,
    pub total_outstanding: Money,
    pub last_payment: Option<Payment>,
    /// Settled items, most recently paid first.
    pub settled: Vec<SettledItem>,
    /// Payments, newest first.
    pub payments: Vec<Payment>,
}

/// One row of the balance report.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerBalance {
    pub customer: Customer,
    pub outstanding: Money,
    pub last_payment: Option<DateTime<Utc>>,
}

/// Bookkeeping entry point: customers, debt items, payments and statements.
///
/// Owns the storage backend; payment allocation is delegated to
/// [`PaymentAllocator`], which borrows it per call.
pub struct LedgerService {
    store: LedgerStoreBox,
}

impl LedgerService {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn allocator(&self) -> PaymentAllocator<'_> {
        PaymentAllocator::new(self.store.as_ref())
    }

    pub async fn allocate_payment(
        &self,
        customer: impl Into<CustomerRef>,
        amount: Decimal,
    ) -> Result<Allocation, AllocationError> {
        self.allocator().allocate_payment(customer, amount).await
    }

    pub async fn register_customer(&self, name: &str) -> Result<Customer> {
        let name = normalize_name(name)?;
        let customer = self.store.insert_customer(&name).await?;
        info!("Registered customer {} ({})", customer.name, customer.id);
        Ok(customer)
    }

    pub async fn rename_customer(
        &self,
        customer: impl Into<CustomerRef>,
        new_name: &str,
    ) -> Result<Customer> {
        let new_name = normalize_name(new_name)?;
        let id = self.require(customer.into()).await?.id;
        self.store.rename_customer(id, &new_name).await
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        self.store.list_customers().await
    }

    /// Looks a customer up by id, or by name as a secondary index.
    pub async fn resolve(&self, customer: impl Into<CustomerRef>) -> Result<Option<Customer>> {
        match customer.into() {
            CustomerRef::Id(id) => self.store.get_customer(id).await,
            CustomerRef::Name(name) => self.store.find_customer_by_name(name.trim()).await,
        }
    }

    async fn require(&self, customer: CustomerRef) -> Result<Customer> {
        let found = match &customer {
            CustomerRef::Id(id) => self.store.get_customer(*id).await?,
            CustomerRef::Name(name) => self.store.find_customer_by_name(name.trim()).await?,
        };
        found.ok_or(LedgerError::CustomerNotFound(customer))
    }

    /// Deletes a customer whose tab is fully settled, with its history.
    pub async fn delete_customer(&self, customer: impl Into<CustomerRef>) -> Result<CustomerId> {
        let customer = self.require(customer.into()).await?;
        self.store.delete_customer(customer.id).await?;
        info!("Deleted customer {} ({})", customer.name, customer.id);
        Ok(customer.id)
    }

    /// Adds a charge to the customer's tab, dated now.
    pub async fn record_debt(
        &self,
        customer: impl Into<CustomerRef>,
        description: &str,
        amount: Decimal,
    ) -> Result<DebtItem> {
        self.record_debt_at(customer, description, amount, Utc::now())
            .await
    }

    pub async fn record_debt_at(
        &self,
        customer: impl Into<CustomerRef>,
        description: &str,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<DebtItem> {
        let description = normalize_description(description)?;
        let amount = Amount::new(amount)?;
        let customer = self.require(customer.into()).await?;
        self.store
            .create_debt_item(customer.id, &description, amount, created_at)
            .await
    }

    /// Removes one debt item and returns the customer it belonged to.
    pub async fn delete_debt_item(&self, item_id: DebtItemId) -> Result<CustomerId> {
        self.store.delete_debt_item(item_id).await
    }

    pub async fn statement(&self, customer: impl Into<CustomerRef>) -> Result<CustomerStatement> {
        let customer = self.require(customer.into()).await?;

        let mut outstanding = self.store.list_outstanding(customer.id).await?;
        outstanding.reverse();
        let total_outstanding = outstanding_total(&outstanding)?;
        let payments = self.store.list_payments(customer.id).await?;
        let settled = self.store.list_settled(customer.id).await?;

        Ok(CustomerStatement {
            last_payment: payments.first().cloned(),
            customer,
            outstanding,
            total_outstanding,
            settled,
            payments,
        })
    }

    /// Outstanding total and last payment date of every customer, by name.
    pub async fn balances(&self) -> Result<Vec<CustomerBalance>> {
        let mut balances = Vec::new();
        for customer in self.store.list_customers().await? {
            let outstanding = self.store.sum_outstanding(customer.id).await?;
            let last_payment = self
                .store
                .list_payments(customer.id)
                .await?
                .first()
                .map(|p| p.paid_at);
            balances.push(CustomerBalance {
                customer,
                outstanding,
                last_payment,
            });
        }
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use rust_decimal_macros::dec;

    fn service() -> LedgerService {
        LedgerService::new(Box::new(InMemoryLedgerStore::new()))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_register_customer_validation() {
        let ledger = service();
        let maria = ledger.register_customer("  Maria  ").await.unwrap();
        assert_eq!(maria.name, "Maria");

        assert!(matches!(
            ledger.register_customer("   ").await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.register_customer("Maria").await,
            Err(LedgerError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn test_record_debt_validation() {
        let ledger = service();
        ledger.register_customer("Maria").await.unwrap();

        assert!(matches!(
            ledger.record_debt("Maria", "  ", dec!(1)).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.record_debt("Maria", "bread", dec!(0)).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.record_debt("Ana", "bread", dec!(1)).await,
            Err(LedgerError::CustomerNotFound(CustomerRef::Name(name))) if name == "Ana"
        ));
        assert!(matches!(
            ledger.record_debt(CustomerId(99), "bread", dec!(1)).await,
            Err(LedgerError::CustomerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_does_not_break_id_references() {
        let ledger = service();
        let maria = ledger.register_customer("Maria").await.unwrap();
        ledger.record_debt(maria.id, "bread", dec!(4)).await.unwrap();

        ledger.rename_customer(maria.id, "Maria José").await.unwrap();

        ledger.allocate_payment(maria.id, dec!(4)).await.unwrap();
        assert!(ledger.resolve("Maria").await.unwrap().is_none());
        assert_eq!(
            ledger.resolve("Maria José").await.unwrap().map(|c| c.id),
            Some(maria.id)
        );
    }

    #[tokio::test]
    async fn test_statement() {
        let ledger = service();
        let maria = ledger.register_customer("Maria").await.unwrap();
        ledger
            .record_debt_at(maria.id, "rice", dec!(10), at(100))
            .await
            .unwrap();
        ledger
            .record_debt_at(maria.id, "beans", dec!(5), at(200))
            .await
            .unwrap();
        ledger
            .allocator()
            .allocate_payment_at(maria.id, dec!(12), at(300))
            .await
            .unwrap();

        let statement = ledger.statement(maria.id).await.unwrap();
        assert_eq!(statement.total_outstanding, Money::new(dec!(3)));
        assert_eq!(statement.outstanding.len(), 1);
        assert_eq!(statement.outstanding[0].description, "beans");
        assert_eq!(statement.settled.len(), 1);
        assert_eq!(statement.settled[0].description, "rice");
        let last = statement.last_payment.unwrap();
        assert_eq!(last.amount.value(), dec!(12));
        assert_eq!(last.paid_at, at(300));
    }

    #[tokio::test]
    async fn test_delete_customer_requires_settled_tab() {
        let ledger = service();
        let maria = ledger.register_customer("Maria").await.unwrap();
        ledger.record_debt(maria.id, "bread", dec!(4)).await.unwrap();

        assert!(matches!(
            ledger.delete_customer("Maria").await,
            Err(LedgerError::HasOutstandingDebt(_))
        ));

        ledger.allocate_payment("Maria", dec!(4)).await.unwrap();
        assert_eq!(ledger.delete_customer("Maria").await.unwrap(), maria.id);
        assert!(ledger.list_customers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balances_report() {
        let ledger = service();
        let maria = ledger.register_customer("Maria").await.unwrap();
        ledger.register_customer("Ana").await.unwrap();
        ledger.record_debt(maria.id, "bread", dec!(4)).await.unwrap();
        ledger.allocate_payment(maria.id, dec!(1.5)).await.unwrap();

        let balances = ledger.balances().await.unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].customer.name, "Ana");
        assert_eq!(balances[0].outstanding, Money::ZERO);
        assert!(balances[0].last_payment.is_none());
        assert_eq!(balances[1].outstanding, Money::new(dec!(2.5)));
        assert!(balances[1].last_payment.is_some());
    }

    #[tokio::test]
    async fn test_delete_debt_item() {
        let ledger = service();
        let maria = ledger.register_customer("Maria").await.unwrap();
        let item = ledger.record_debt(maria.id, "bread", dec!(4)).await.unwrap();

        assert_eq!(ledger.delete_debt_item(item.id).await.unwrap(), maria.id);
        assert_eq!(
            ledger.statement(maria.id).await.unwrap().total_outstanding,
            Money::ZERO
        );
    }
}
