//! Pure commission math: percentage, tiered and fixed-amount rules, and
//! proportional per-item allocation.

use rust_decimal::Decimal;

use mercur_core::money::{Money, Rate};

/// One sales band of a tiered rule. `max` of `None` means the band is
/// open-ended.
#[derive(Debug, Clone)]
pub struct TierBand {
    pub min: Money,
    pub max: Option<Money>,
    pub rate: Rate,
}

/// The contribution of one band to a tiered calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPortion {
    pub tier_min: Money,
    pub tier_max: Option<Money>,
    pub tier_rate: Rate,
    pub tier_sales_amount: Money,
    pub tier_commission: Money,
}

/// Percentage rule: `total = sales × rate / 100`.
pub fn percentage_commission(rate: Rate, total_sales: Money) -> Money {
    rate.percent_of(total_sales)
}

/// Fixed-amount rule: `total = item_count × rate` (the rate field carries
/// the per-item amount).
pub fn fixed_commission(rate: Rate, item_count: usize) -> Money {
    Money::new(rate.value() * Decimal::from(item_count as u64))
}

/// Tiered rule: for each band the portion of sales falling inside the band
/// earns that band's rate. Bands must be ordered by `min` ascending.
///
/// Returns the total plus the per-band breakdown (bands with no sales
/// portion are omitted).
pub fn tiered_commission(bands: &[TierBand], total_sales: Money) -> (Money, Vec<TierPortion>) {
    let mut total = Money::ZERO;
    let mut portions = Vec::new();

    for band in bands {
        if total_sales <= band.min {
            continue;
        }
        let sales_in_band = match band.max {
            Some(max) if total_sales > max => max - band.min,
            _ => total_sales - band.min,
        };
        if sales_in_band <= Money::ZERO {
            continue;
        }

        let commission = band.rate.percent_of(sales_in_band);
        total += commission;
        portions.push(TierPortion {
            tier_min: band.min,
            tier_max: band.max,
            tier_rate: band.rate,
            tier_sales_amount: sales_in_band,
            tier_commission: commission,
        });
    }

    (total, portions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(raw: &str) -> Money {
        Money::parse(raw).unwrap()
    }

    fn rate(raw: &str) -> Rate {
        Rate::parse(raw).unwrap()
    }

    fn band(min: &str, max: Option<&str>, r: &str) -> TierBand {
        TierBand {
            min: money(min),
            max: max.map(money),
            rate: rate(r),
        }
    }

    #[test]
    fn percentage_rule() {
        let total = percentage_commission(rate("5"), money("1500.00"));
        assert_eq!(total.to_string(), "75.00");
    }

    #[test]
    fn fixed_rule_counts_items() {
        let total = fixed_commission(rate("2.50"), 4);
        assert_eq!(total.to_string(), "10.00");
        assert_eq!(fixed_commission(rate("2.50"), 0), Money::ZERO);
    }

    #[test]
    fn tiered_rule_splits_across_bands() {
        // [0, 1000) at 5%, [1000, open) at 10%, sales 1500:
        // tier 1 earns 1000 at 5% = 50, tier 2 earns 500 at 10% = 50.
        let bands = vec![band("0", Some("1000"), "5.0000"), band("1000", None, "10.0000")];
        let (total, portions) = tiered_commission(&bands, money("1500.00"));

        assert_eq!(total.to_string(), "100.00");
        assert_eq!(portions.len(), 2);
        assert_eq!(portions[0].tier_sales_amount.to_string(), "1000.00");
        assert_eq!(portions[0].tier_commission.to_string(), "50.00");
        assert_eq!(portions[1].tier_sales_amount.to_string(), "500.00");
        assert_eq!(portions[1].tier_commission.to_string(), "50.00");

        assert_eq!(
            Rate::effective(total, money("1500.00")).to_percent_string(),
            "6.67"
        );
    }

    #[test]
    fn tiered_rule_within_first_band() {
        let bands = vec![band("0", Some("1000"), "5"), band("1000", None, "10")];
        let (total, portions) = tiered_commission(&bands, money("400.00"));
        assert_eq!(total.to_string(), "20.00");
        assert_eq!(portions.len(), 1);
    }

    #[test]
    fn tiered_rule_zero_sales() {
        let bands = vec![band("0", Some("1000"), "5"), band("1000", None, "10")];
        let (total, portions) = tiered_commission(&bands, Money::ZERO);
        assert_eq!(total, Money::ZERO);
        assert!(portions.is_empty());
    }

    #[test]
    fn tiered_rule_exactly_at_boundary() {
        let bands = vec![band("0", Some("1000"), "5"), band("1000", None, "10")];
        // Sales exactly at the boundary stay entirely in the first band.
        let (total, portions) = tiered_commission(&bands, money("1000.00"));
        assert_eq!(total.to_string(), "50.00");
        assert_eq!(portions.len(), 1);
    }
}
