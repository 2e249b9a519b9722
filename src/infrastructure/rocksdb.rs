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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing customers.
pub const CF_CUSTOMERS: &str = "customers";
/// Column Family for storing debt items, settled or not.
pub const CF_DEBT_ITEMS: &str = "debt_items";
/// Column Family for storing payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for bookkeeping such as id high-water marks.
pub const CF_META: &str = "meta";

const NEXT_CUSTOMER: &[u8] = b"next_customer";
const NEXT_ITEM: &[u8] = b"next_item";
const NEXT_PAYMENT: &[u8] = b"next_payment";

struct Inner {
    db: DB,
    locks: CustomerLocks,
    /// Serializes writes to the customer table (name uniqueness).
    catalog: Mutex<()>,
    /// Held while an id is drawn and its high-water mark written, so the
    /// stored marks never move backwards.
    watermarks: Mutex<()>,
    customer_ids: Sequence,
    item_ids: Sequence,
    payment_ids: Sequence,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

impl Inner {
    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("Column family '{}' not found", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = entry?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn last_id(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf(cf_name)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(entry) => {
                let (key, _value) = entry?;
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    LedgerError::Storage(format!("Malformed key in '{}'", cf_name))
                })?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    fn items_of(&self, customer_id: CustomerId) -> Result<Vec<DebtItem>> {
        Ok(self
            .scan::<DebtItem>(CF_DEBT_ITEMS)?
            .into_iter()
            .filter(|item| item.customer_id == customer_id)
            .collect())
    }

    fn outstanding_of(&self, customer_id: CustomerId) -> Result<Vec<DebtItem>> {
        let mut items: Vec<DebtItem> = self
            .items_of(customer_id)?
            .into_iter()
            .filter(DebtItem::is_outstanding)
            .collect();
        sort_fifo(&mut items);
        Ok(items)
    }

    fn watermark(&self, key: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LedgerError::Storage("Malformed id high-water mark".to_string())
                })?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    /// Resumes after the larger of the stored mark and the highest live key.
    fn resume(&self, cf_name: &str, key: &[u8]) -> Result<Sequence> {
        let last = self.last_id(cf_name)?.max(self.watermark(key)?);
        Ok(Sequence::starting_after(last))
    }

    fn put_watermark(
        &self,
        batch: &mut WriteBatch,
        key: &[u8],
        sequence: &Sequence,
    ) -> Result<()> {
        batch.put_cf(self.cf(CF_META)?, key, sequence.current().to_be_bytes());
        Ok(())
    }

    fn customer_exists(&self, id: CustomerId) -> Result<bool> {
        let cf = self.cf(CF_CUSTOMERS)?;
        Ok(self.db.get_pinned_cf(cf, id.0.to_be_bytes())?.is_some())
    }

    /// Deletes a settled-up customer with its items and payments in one batch.
    fn remove_customer(&self, id: CustomerId) -> Result<()> {
        if !self.customer_exists(id)? {
            return Err(LedgerError::CustomerNotFound(id.into()));
        }
        let items = self.items_of(id)?;
        if items.iter().any(DebtItem::is_outstanding) {
            return Err(LedgerError::HasOutstandingDebt(id));
        }
        let payments: Vec<Payment> = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.customer_id == id)
            .collect();

        let mut batch = WriteBatch::default();
        let items_cf = self.cf(CF_DEBT_ITEMS)?;
        for item in &items {
            batch.delete_cf(items_cf, item.id.0.to_be_bytes());
        }
        let payments_cf = self.cf(CF_PAYMENTS)?;
        for payment in &payments {
            batch.delete_cf(payments_cf, payment.id.0.to_be_bytes());
        }
        batch.delete_cf(self.cf(CF_CUSTOMERS)?, id.0.to_be_bytes());
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl ChangeSink for Inner {
    fn next_payment_id(&self) -> PaymentId {
        PaymentId(self.payment_ids.next())
    }

    async fn apply(&self, changes: ChangeSet) -> Result<()> {
        let payments_cf = self.cf(CF_PAYMENTS)?;
        let items_cf = self.cf(CF_DEBT_ITEMS)?;

        let mut batch = WriteBatch::default();
        for payment in &changes.payments {
            batch.put_cf(payments_cf, payment.id.0.to_be_bytes(), encode(payment)?);
        }
        for item in &changes.items {
            batch.put_cf(items_cf, item.id.0.to_be_bytes(), encode(item)?);
        }
        let _watermarks = self.watermarks.lock().await;
        self.put_watermark(&mut batch, NEXT_PAYMENT, &self.payment_ids)?;
        self.db.write(batch)?;
        Ok(())
    }
}

/// A persistent ledger backed by RocksDB.
///
/// Customers, debt items and payments live in separate Column Families, keyed
/// by their big-endian id and stored as JSON. Multi-row changes go through a
/// single `WriteBatch`, so they land atomically.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc`).
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    inner: Arc<Inner>,
}

impl RocksDBLedgerStore {
    /// Opens or creates a RocksDB ledger at the specified path.
    ///
    /// Creates the column families on first use and resumes id sequences from
    /// the highest stored keys.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_CUSTOMERS, CF_DEBT_ITEMS, CF_PAYMENTS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let mut inner = Inner {
            db,
            locks: CustomerLocks::new(),
            catalog: Mutex::new(()),
            watermarks: Mutex::new(()),
            customer_ids: Sequence::default(),
            item_ids: Sequence::default(),
            payment_ids: Sequence::default(),
        };
        inner.customer_ids = inner.resume(CF_CUSTOMERS, NEXT_CUSTOMER)?;
        inner.item_ids = inner.resume(CF_DEBT_ITEMS, NEXT_ITEM)?;
        inner.payment_ids = inner.resume(CF_PAYMENTS, NEXT_PAYMENT)?;

        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn insert_customer(&self, name: &str) -> Result<Customer> {
        let _catalog = self.inner.catalog.lock().await;
        if self.find_customer_by_name(name).await?.is_some() {
            return Err(LedgerError::DuplicateName(name.to_string()));
        }
        let _watermarks = self.inner.watermarks.lock().await;
        let customer = Customer::new(CustomerId(self.inner.customer_ids.next()), name.to_string());
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.inner.cf(CF_CUSTOMERS)?,
            customer.id.0.to_be_bytes(),
            encode(&customer)?,
        );
        self.inner
            .put_watermark(&mut batch, NEXT_CUSTOMER, &self.inner.customer_ids)?;
        self.inner.db.write(batch)?;
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        self.inner.get(CF_CUSTOMERS, id.0)
    }

    async fn find_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        Ok(self
            .inner
            .scan::<Customer>(CF_CUSTOMERS)?
            .into_iter()
            .find(|c| c.name == name))
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let mut customers = self.inner.scan::<Customer>(CF_CUSTOMERS)?;
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn rename_customer(&self, id: CustomerId, name: &str) -> Result<Customer> {
        let _catalog = self.inner.catalog.lock().await;
        if let Some(other) = self.find_customer_by_name(name).await?
            && other.id != id
        {
            return Err(LedgerError::DuplicateName(name.to_string()));
        }
        let mut customer: Customer = self
            .inner
            .get(CF_CUSTOMERS, id.0)?
            .ok_or(LedgerError::CustomerNotFound(id.into()))?;
        customer.name = name.to_string();
        let cf = self.inner.cf(CF_CUSTOMERS)?;
        self.inner
            .db
            .put_cf(cf, id.0.to_be_bytes(), encode(&customer)?)?;
        Ok(customer)
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let removed = {
            let _guard = self.inner.locks.acquire(id).await;
            let _catalog = self.inner.catalog.lock().await;
            self.inner.remove_customer(id)
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
        if !self.inner.customer_exists(customer_id)? {
            return Err(LedgerError::CustomerNotFound(customer_id.into()));
        }
        let _watermarks = self.inner.watermarks.lock().await;
        let item = DebtItem {
            id: DebtItemId(self.inner.item_ids.next()),
            customer_id,
            description: description.to_string(),
            amount,
            created_at,
            settled_by: None,
        };
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.inner.cf(CF_DEBT_ITEMS)?,
            item.id.0.to_be_bytes(),
            encode(&item)?,
        );
        self.inner
            .put_watermark(&mut batch, NEXT_ITEM, &self.inner.item_ids)?;
        self.inner.db.write(batch)?;
        Ok(item)
    }

    async fn delete_debt_item(&self, item_id: DebtItemId) -> Result<CustomerId> {
        let not_found = || LedgerError::NotFound(format!("Debt item {}", item_id));
        let item: DebtItem = self
            .inner
            .get(CF_DEBT_ITEMS, item_id.0)?
            .ok_or_else(not_found)?;
        let _guard = self.inner.locks.acquire(item.customer_id).await;
        let cf = self.inner.cf(CF_DEBT_ITEMS)?;
        if self.inner.db.get_pinned_cf(cf, item_id.0.to_be_bytes())?.is_none() {
            return Err(not_found());
        }
        self.inner.db.delete_cf(cf, item_id.0.to_be_bytes())?;
        Ok(item.customer_id)
    }

    async fn list_outstanding(&self, customer_id: CustomerId) -> Result<Vec<DebtItem>> {
        self.inner.outstanding_of(customer_id)
    }

    async fn sum_outstanding(&self, customer_id: CustomerId) -> Result<Money> {
        outstanding_total(&self.inner.items_of(customer_id)?)
    }

    async fn list_settled(&self, customer_id: CustomerId) -> Result<Vec<SettledItem>> {
        let payments: HashMap<PaymentId, Payment> = self
            .list_payments(customer_id)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let mut settled: Vec<SettledItem> = self
            .inner
            .items_of(customer_id)?
            .into_iter()
            .filter_map(|item| {
                let payment = payments.get(&item.settled_by?)?;
                Some(SettledItem {
                    item_id: item.id,
                    description: item.description,
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
        let mut payments: Vec<Payment> = self
            .inner
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.customer_id == customer_id)
            .collect();
        payments.sort_by(|a, b| (b.paid_at, b.id).cmp(&(a.paid_at, a.id)));
        Ok(payments)
    }

    async fn begin(&self, customer_id: CustomerId) -> Result<LedgerTransactionBox> {
        let guard = self.inner.locks.acquire(customer_id).await;
        if !self.inner.customer_exists(customer_id)? {
            return Err(LedgerError::CustomerNotFound(customer_id.into()));
        }
        let outstanding = self.inner.outstanding_of(customer_id)?;
        let sink: Arc<dyn ChangeSink> = self.inner.clone();
        Ok(Box::new(UnitOfWork::new(
            customer_id,
            outstanding,
            sink,
            guard,
        )))
    }
}
