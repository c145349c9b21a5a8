//! Pure pricing math: discount amounts and document totals.
//!
//! Everything here is decimal arithmetic at scale 2. Discounts are capped at
//! the undiscounted line amount, so a line total can never go negative.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use mercur_core::money::{Money, Rate};
use mercur_core::types::DiscountType;

/// Computes the discount amount for one line.
///
/// - PERCENTAGE: `unit_price × quantity × value / 100`
/// - FIXED_AMOUNT: `value × quantity`
/// - BUY_X_GET_Y: `⌊quantity / min_quantity⌋ × value` free items at
///   `unit_price`
///
/// The result is clamped to `[0, unit_price × quantity]`.
pub fn discount_amount(
    discount_type: DiscountType,
    value: Decimal,
    unit_price: Money,
    quantity: i32,
    min_quantity: i32,
) -> Money {
    let line = unit_price.times(quantity);

    let raw = match discount_type {
        DiscountType::Percentage => {
            Money::new(line.amount() * value / Decimal::ONE_HUNDRED)
        }
        DiscountType::FixedAmount => Money::new(value * Decimal::from(quantity)),
        DiscountType::BuyXGetY => {
            if min_quantity <= 0 || quantity < min_quantity {
                Money::ZERO
            } else {
                let free_per_bundle = value.trunc().to_i32().unwrap_or(0);
                let free_items = (quantity / min_quantity) * free_per_bundle;
                unit_price.times(free_items)
            }
        }
    };

    if raw.is_negative() {
        Money::ZERO
    } else {
        raw.min(line)
    }
}

/// Document-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

/// Computes totals from `(pre_discount, discount)` pairs:
/// `subtotal = Σ pre_discount`, `discount = Σ discount`,
/// `tax = (subtotal − discount) × tax_rate`,
/// `total = subtotal − discount + tax`.
pub fn totals(lines: &[(Money, Money)], tax_rate: Rate) -> Totals {
    let mut subtotal = Money::ZERO;
    let mut discount = Money::ZERO;
    for (pre_discount, line_discount) in lines {
        subtotal += *pre_discount;
        discount += *line_discount;
    }
    let tax = tax_rate.percent_of(subtotal - discount);
    let total = subtotal - discount + tax;
    Totals {
        subtotal,
        discount,
        tax,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(raw: &str) -> Money {
        Money::parse(raw).unwrap()
    }

    #[test]
    fn percentage_discount() {
        // 2 × 10.00 at 10% -> 2.00
        let amount = discount_amount(DiscountType::Percentage, dec!(10), money("10.00"), 2, 1);
        assert_eq!(amount.to_string(), "2.00");
    }

    #[test]
    fn percentage_discount_caps_at_line() {
        let amount = discount_amount(DiscountType::Percentage, dec!(150), money("10.00"), 2, 1);
        assert_eq!(amount.to_string(), "20.00");
    }

    #[test]
    fn fixed_amount_discount() {
        let amount = discount_amount(DiscountType::FixedAmount, dec!(1.50), money("10.00"), 3, 1);
        assert_eq!(amount.to_string(), "4.50");
    }

    #[test]
    fn fixed_amount_caps_at_line() {
        let amount = discount_amount(DiscountType::FixedAmount, dec!(12), money("10.00"), 2, 1);
        assert_eq!(amount.to_string(), "20.00");
    }

    #[test]
    fn buy_x_get_y() {
        // buy 2 get 1: quantity 5 -> 2 bundles -> 2 free items
        let amount = discount_amount(DiscountType::BuyXGetY, dec!(1), money("4.00"), 5, 2);
        assert_eq!(amount.to_string(), "8.00");
    }

    #[test]
    fn buy_x_get_y_below_min_quantity() {
        let amount = discount_amount(DiscountType::BuyXGetY, dec!(1), money("4.00"), 1, 2);
        assert_eq!(amount, Money::ZERO);
    }

    #[test]
    fn buy_x_get_y_caps_at_line() {
        // pathological rule: 5 free per single unit bought
        let amount = discount_amount(DiscountType::BuyXGetY, dec!(5), money("4.00"), 2, 1);
        assert_eq!(amount.to_string(), "8.00");
    }

    #[test]
    fn negative_value_clamps_to_zero() {
        let amount = discount_amount(DiscountType::FixedAmount, dec!(-3), money("10.00"), 1, 1);
        assert_eq!(amount, Money::ZERO);
    }

    #[test]
    fn document_totals() {
        // 2 units at 10.00 with a 2.00 discount and 10% tax.
        let lines = vec![(money("20.00"), money("2.00"))];
        let t = totals(&lines, Rate::parse("10").unwrap());
        assert_eq!(t.subtotal.to_string(), "20.00");
        assert_eq!(t.discount.to_string(), "2.00");
        assert_eq!(t.tax.to_string(), "1.80");
        assert_eq!(t.total.to_string(), "19.80");
    }

    #[test]
    fn empty_document_totals_are_zero() {
        let t = totals(&[], Rate::parse("10").unwrap());
        assert_eq!(t.subtotal, Money::ZERO);
        assert_eq!(t.total, Money::ZERO);
    }

    #[test]
    fn totals_over_multiple_lines() {
        let lines = vec![
            (money("20.00"), money("2.00")),
            (money("10.00"), Money::ZERO),
        ];
        let t = totals(&lines, Rate::parse("10").unwrap());
        assert_eq!(t.subtotal.to_string(), "30.00");
        assert_eq!(t.discount.to_string(), "2.00");
        assert_eq!(t.tax.to_string(), "2.80");
        assert_eq!(t.total.to_string(), "30.80");
    }
}
