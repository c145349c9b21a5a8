//! # Money Module
//!
//! Fixed-scale decimal money and rate types.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: arbitrary-precision decimals                             │
//! │    Amounts carry scale 2, rates carry scale 4.                          │
//! │    The wire format is the fixed-scale string ("19.80", "5.0000").       │
//! │    Rounding is half-even everywhere.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercur_core::money::{Money, Rate};
//!
//! let price = Money::parse("10.00").unwrap();
//! let line = price.times(2);                 // 20.00
//! let rate = Rate::parse("10").unwrap();     // 10.0000 %
//! assert_eq!(rate.percent_of(line).to_string(), "2.00");
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Scale used for monetary amounts on the wire.
const AMOUNT_SCALE: u32 = 2;

/// Scale used for percentage rates on the wire.
const RATE_SCALE: u32 = 4;

/// Parse failure for monetary input.
///
/// Parsers reject empty strings, NaN and anything that is not a plain
/// decimal number. Scientific notation is not accepted.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid decimal value: {0:?}")]
pub struct MoneyError(pub String);

fn parse_decimal(raw: &str) -> Result<Decimal, MoneyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MoneyError(raw.to_string()));
    }
    Decimal::from_str(trimmed).map_err(|_| MoneyError(raw.to_string()))
}

// =============================================================================
// Money
// =============================================================================

/// A monetary amount at scale 2, rounded half-even.
///
/// Stored as NUMERIC in PostgreSQL and as a fixed two-decimal string on the
/// wire. Negative amounts are legal (returns, adjustments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a Money value, rounding to scale 2 half-even.
    pub fn new(amount: Decimal) -> Self {
        Money(amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven))
    }

    /// Parses a wire-format amount string.
    pub fn parse(raw: &str) -> Result<Self, MoneyError> {
        parse_decimal(raw).map(Money::new)
    }

    /// The underlying decimal value.
    #[inline]
    pub fn amount(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity (line totals).
    pub fn times(&self, quantity: i32) -> Money {
        Money::new(self.0 * Decimal::from(quantity))
    }

    /// Returns the smaller of two amounts. Used to cap discounts at the
    /// undiscounted line amount.
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Allocates `self * numerator / denominator`, or zero when the
    /// denominator is zero. Used for proportional commission allocation.
    pub fn allocate(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.is_zero() {
            return Money::ZERO;
        }
        Money::new(self.0 * numerator.0 / denominator.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse(&raw).map_err(de::Error::custom)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate at scale 4 ("5.0000" means five percent).
///
/// Commission rates, tax rates and processing-fee rates all use this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// Creates a Rate, rounding to scale 4 half-even.
    pub fn new(rate: Decimal) -> Self {
        Rate(rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointNearestEven))
    }

    /// Parses a wire-format rate string.
    pub fn parse(raw: &str) -> Result<Self, MoneyError> {
        parse_decimal(raw).map(Rate::new)
    }

    #[inline]
    pub fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Applies the rate to an amount: `amount * rate / 100`.
    pub fn percent_of(&self, amount: Money) -> Money {
        Money::new(amount.amount() * self.0 / Decimal::ONE_HUNDRED)
    }

    /// The effective rate of `commission` over `sales` as a percentage,
    /// or zero when there were no sales.
    pub fn effective(commission: Money, sales: Money) -> Rate {
        if sales.is_zero() {
            return Rate::ZERO;
        }
        Rate::new(commission.amount() / sales.amount() * Decimal::ONE_HUNDRED)
    }

    /// Formats at scale 2 for report fields ("6.67").
    pub fn to_percent_string(&self) -> String {
        format!(
            "{:.2}",
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        )
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rate::parse(&raw).map_err(de::Error::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_and_format_fixed_scale() {
        assert_eq!(Money::parse("10").unwrap().to_string(), "10.00");
        assert_eq!(Money::parse("10.5").unwrap().to_string(), "10.50");
        assert_eq!(Money::parse("-5.5").unwrap().to_string(), "-5.50");
        assert_eq!(Rate::parse("5").unwrap().to_string(), "5.0000");
        assert_eq!(Rate::parse("8.25").unwrap().to_string(), "8.2500");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Money::parse("").is_err());
        assert!(Money::parse("  ").is_err());
        assert!(Money::parse("NaN").is_err());
        assert!(Money::parse("12.3.4").is_err());
        assert!(Money::parse("ten dollars").is_err());
        assert!(Rate::parse("inf").is_err());
    }

    #[test]
    fn rounding_is_half_even() {
        // 0.125 rounds to 0.12, 0.135 rounds to 0.14
        assert_eq!(Money::new(dec!(0.125)).to_string(), "0.12");
        assert_eq!(Money::new(dec!(0.135)).to_string(), "0.14");
        assert_eq!(Rate::new(dec!(0.00005)).to_string(), "0.0000");
        assert_eq!(Rate::new(dec!(0.00015)).to_string(), "0.0002");
    }

    #[test]
    fn arithmetic() {
        let a = Money::parse("10.00").unwrap();
        let b = Money::parse("2.50").unwrap();
        assert_eq!((a + b).to_string(), "12.50");
        assert_eq!((a - b).to_string(), "7.50");
        assert_eq!(a.times(3).to_string(), "30.00");
        assert_eq!((-b).to_string(), "-2.50");

        let mut acc = Money::ZERO;
        acc += a;
        acc -= b;
        assert_eq!(acc.to_string(), "7.50");
    }

    #[test]
    fn percent_application() {
        let subtotal = Money::parse("18.00").unwrap();
        let tax = Rate::parse("10").unwrap().percent_of(subtotal);
        assert_eq!(tax.to_string(), "1.80");

        // 8.25% of 10.00 = 0.825 -> 0.82 half-even
        let tax = Rate::parse("8.25")
            .unwrap()
            .percent_of(Money::parse("10.00").unwrap());
        assert_eq!(tax.to_string(), "0.82");
    }

    #[test]
    fn effective_rate() {
        let rate = Rate::effective(
            Money::parse("100.00").unwrap(),
            Money::parse("1500.00").unwrap(),
        );
        assert_eq!(rate.to_percent_string(), "6.67");
        assert_eq!(Rate::effective(Money::parse("5.00").unwrap(), Money::ZERO), Rate::ZERO);
    }

    #[test]
    fn allocation_guards_zero_denominator() {
        let sales = Money::parse("50.00").unwrap();
        let total = Money::parse("10.00").unwrap();
        let pool = Money::parse("100.00").unwrap();
        assert_eq!(sales.allocate(total, pool).to_string(), "5.00");
        assert_eq!(sales.allocate(total, Money::ZERO), Money::ZERO);
    }

    #[test]
    fn serde_round_trip() {
        let m: Money = serde_json::from_str("\"19.8\"").unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"19.80\"");
        assert!(serde_json::from_str::<Money>("\"oops\"").is_err());
    }
}
