use crate::domain::customer::CustomerId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per customer.
///
/// Every write touching a customer's debt items holds that customer's guard,
/// which is what makes the check-then-allocate sequence of a payment atomic.
#[derive(Default)]
pub struct CustomerLocks {
    locks: Mutex<HashMap<CustomerId, Arc<Mutex<()>>>>,
}

impl CustomerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the customer's tab.
    pub async fn acquire(&self, customer_id: CustomerId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(customer_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forgets the customer's slot unless someone still holds or awaits it.
    pub async fn release(&self, customer_id: CustomerId) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(&customer_id)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(&customer_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Monotonic id generator. Ids handed out by a rolled back transaction are
/// never reused.
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    /// Starts a sequence whose next value is `last + 1`.
    pub fn starting_after(last: u64) -> Self {
        Self(AtomicU64::new(last))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The last value handed out, or the starting point if none was.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
