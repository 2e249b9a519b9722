use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// A signed monetary value used for totals and running balances.
///
/// Wraps `rust_decimal::Decimal` so that sums of debt items compare exactly,
/// without the rounding leftovers binary floating point would produce.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(pub Decimal);

/// A strictly positive monetary amount, as carried by debt items and payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// Largest amount a single charge or payment may carry.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Amounts are whole cents.
pub const AMOUNT_SCALE: u32 = 2;

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "Amount must be positive".to_string(),
            ));
        }
        if value > MAX_AMOUNT {
            return Err(LedgerError::Validation(format!(
                "Amount must not exceed {}",
                MAX_AMOUNT
            )));
        }
        if value.normalize().scale() > AMOUNT_SCALE {
            return Err(LedgerError::Validation(format!(
                "Amount must have at most {} decimal places",
                AMOUNT_SCALE
            )));
        }
        Ok(Self(value))
    }

    /// Parses user input where a comma is the decimal separator.
    ///
    /// Accepts `12,50`, `12.50` and an optional `R$` prefix.
    pub fn parse_localized(input: &str) -> Result<Self, LedgerError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();
        let normalized = trimmed.replace(',', ".");
        let value = Decimal::from_str(&normalized)
            .map_err(|_| LedgerError::Validation(format!("Invalid amount '{}'", input.trim())))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Money> for Amount {
    type Error = LedgerError;

    fn try_from(value: Money) -> Result<Self, Self::Error> {
        Self::new(value.0)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Drops trailing zeros, so `15.00` renders as `15`.
    pub fn normalize(self) -> Self {
        Self(self.0.normalize())
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Adds up `values`, failing instead of overflowing.
    pub fn try_sum<I: IntoIterator<Item = Self>>(values: I) -> Result<Self, LedgerError> {
        values.into_iter().try_fold(Self::ZERO, |total, value| {
            total
                .checked_add(value)
                .ok_or_else(|| LedgerError::Validation("Total is out of range".to_string()))
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_arithmetic() {
        let m1 = Money::new(dec!(10.0));
        let m2 = Money::new(dec!(5.0));
        assert_eq!(m1 + m2, Money::new(dec!(15.0)));
        assert_eq!(m1 - m2, Money::new(dec!(5.0)));

        let total = Money::try_sum([m1, m2, m2]).unwrap();
        assert_eq!(total, Money::new(dec!(20.0)));
    }

    #[test]
    fn test_try_sum_reports_overflow() {
        let huge = Money::new(Decimal::MAX);
        assert!(matches!(
            Money::try_sum([huge, Money::new(dec!(1))]),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(huge.checked_sub(huge), Some(Money::ZERO));
        assert!(Money::new(Decimal::MIN).checked_sub(huge).is_none());
    }

    #[test]
    fn test_exact_cents_cancel_out() {
        let mut remaining = Money::new(dec!(20.00));
        remaining -= Money::new(dec!(10.10));
        remaining -= Money::new(dec!(9.90));
        assert_eq!(remaining, Money::ZERO);
        assert!(!remaining.is_positive());
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_rejects_out_of_range_values() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000_000i64));
        assert!(Amount::new(MAX_AMOUNT).is_ok());
        assert!(Amount::new(MAX_AMOUNT + dec!(0.01)).is_err());
        assert!(Amount::new(Decimal::MAX).is_err());
        assert!(Amount::new(Decimal::from_i128_with_scale(10i128.pow(27), 0)).is_err());

        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(Amount::new(dec!(12.500)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.001)),
            Err(LedgerError::Validation(_))
        ));
        assert!(Amount::parse_localized("1,999").is_err());
    }

    #[test]
    fn test_parse_localized() {
        assert_eq!(
            Amount::parse_localized("12,50").unwrap().value(),
            dec!(12.50)
        );
        assert_eq!(
            Amount::parse_localized(" 7.25 ").unwrap().value(),
            dec!(7.25)
        );
        assert_eq!(
            Amount::parse_localized("R$ 3,00").unwrap().value(),
            dec!(3.00)
        );
        assert!(Amount::parse_localized("abc").is_err());
        assert!(Amount::parse_localized("").is_err());
        assert!(Amount::parse_localized("0,00").is_err());
        assert!(Amount::parse_localized("-5").is_err());
    }

    #[test]
    fn test_amount_deserialization_rejects_non_positive() {
        let ok: Amount = serde_json::from_str("\"4.5\"").unwrap();
        assert_eq!(ok.value(), dec!(4.5));
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }

    #[test]
    fn test_money_display_precision() {
        assert_eq!(format!("{:.2}", Money::new(dec!(20))), "20.00");
        assert_eq!(Money::new(dec!(15.00)).normalize().to_string(), "15");
    }
}
