//! Property-based tests for payment allocation.
//!
//! Properties:
//!
//! 1. **Conservation**: a valid payment lowers the outstanding total by exactly
//!    the amount paid.
//! 2. **FIFO prefix**: the settled items are always the oldest ones, and at
//!    most one item is left partially paid.
//! 3. **Failure is a no-op**: an overpayment changes nothing.

use chrono::DateTime;
use fiado::application::ledger::LedgerService;
use fiado::domain::customer::CustomerId;
use fiado::domain::money::Money;
use fiado::error::AllocationError;
use fiado::infrastructure::in_memory::InMemoryLedgerStore;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

fn tab_and_payment() -> impl Strategy<Value = (Vec<i64>, i64)> {
    prop::collection::vec(1i64..100_000, 1..12).prop_flat_map(|items| {
        let total: i64 = items.iter().sum();
        (Just(items), 1..=total)
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn ledger_with(items: &[i64]) -> (LedgerService, CustomerId) {
    let ledger = LedgerService::new(Box::new(InMemoryLedgerStore::new()));
    let customer = ledger.register_customer("Maria").await.unwrap();
    for (i, value) in items.iter().enumerate() {
        ledger
            .record_debt_at(
                customer.id,
                &format!("item {}", i),
                cents(*value),
                DateTime::from_timestamp(1_000 + i as i64, 0).unwrap(),
            )
            .await
            .unwrap();
    }
    (ledger, customer.id)
}

proptest! {
    #[test]
    fn prop_payment_conserves_total((items, payment) in tab_and_payment()) {
        runtime().block_on(async {
            let (ledger, id) = ledger_with(&items).await;
            let total: i64 = items.iter().sum();

            ledger.allocate_payment(id, cents(payment)).await.unwrap();

            let after = ledger.store().sum_outstanding(id).await.unwrap();
            assert_eq!(after, Money::new(cents(total - payment)));
        });
    }

    #[test]
    fn prop_settlement_is_an_oldest_first_prefix((items, payment) in tab_and_payment()) {
        runtime().block_on(async {
            let (ledger, id) = ledger_with(&items).await;

            ledger.allocate_payment(id, cents(payment)).await.unwrap();

            let outstanding = ledger.store().list_outstanding(id).await.unwrap();
            let settled = items.len() - outstanding.len();

            // Untouched items keep their original amounts; only the oldest
            // remaining one may have been reduced.
            for (offset, item) in outstanding.iter().enumerate() {
                let original = cents(items[settled + offset]);
                assert_eq!(item.description, format!("item {}", settled + offset));
                if offset == 0 {
                    assert!(item.amount.value() <= original);
                } else {
                    assert_eq!(item.amount.value(), original);
                }
                assert!(item.amount.value() > Decimal::ZERO);
            }
        });
    }

    #[test]
    fn prop_overpayment_changes_nothing(
        items in prop::collection::vec(1i64..100_000, 0..8),
        excess in 1i64..100_000,
    ) {
        runtime().block_on(async {
            let (ledger, id) = ledger_with(&items).await;
            let total: i64 = items.iter().sum();
            let before = ledger.statement(id).await.unwrap();

            let result = ledger.allocate_payment(id, cents(total + excess)).await;
            assert!(
                matches!(result, Err(AllocationError::Overpayment { .. })),
                "expected overpayment error"
            );

            assert_eq!(ledger.statement(id).await.unwrap(), before);
        });
    }
}
