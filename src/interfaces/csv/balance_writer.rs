use crate::application::ledger::CustomerBalance;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct BalanceRecord<'a> {
    customer: u64,
    name: &'a str,
    outstanding: String,
    last_payment: String,
}

/// Writes the balance report as CSV: `customer,name,outstanding,last_payment`.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, balances: &[CustomerBalance]) -> Result<()> {
        for balance in balances {
            self.writer.serialize(BalanceRecord {
                customer: balance.customer.id.0,
                name: &balance.customer.name,
                outstanding: balance.outstanding.normalize().to_string(),
                last_payment: balance
                    .last_payment
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            })?;
        }
        if balances.is_empty() {
            self.writer
                .write_record(["customer", "name", "outstanding", "last_payment"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
