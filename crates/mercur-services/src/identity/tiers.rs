//! Commission tier table validation.
//!
//! For a given employee the tier bands must be ascending, non-overlapping
//! and together cover `[0, ∞)`: the first band starts at zero, each band's
//! upper bound equals the next band's lower bound, and the last band is
//! open-ended.

use serde::{Deserialize, Serialize};

use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::{Money, Rate};

/// One tier band as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub min_sales_amount: Money,
    pub max_sales_amount: Option<Money>,
    pub commission_rate: Rate,
}

/// Validates a complete tier table. Tiers must already be ordered by
/// `min_sales_amount` ascending.
pub fn validate_tiers(tiers: &[TierSpec]) -> ServiceResult<()> {
    if tiers.is_empty() {
        return Err(ServiceError::invalid_argument(
            "at least one commission tier is required",
        ));
    }

    if !tiers[0].min_sales_amount.is_zero() {
        return Err(ServiceError::invalid_argument(
            "the first tier must start at 0",
        ));
    }

    for (index, tier) in tiers.iter().enumerate() {
        if tier.min_sales_amount.is_negative() {
            return Err(ServiceError::invalid_argument(
                "tier bounds must not be negative",
            ));
        }

        match (tier.max_sales_amount, tiers.get(index + 1)) {
            (Some(max), Some(next)) => {
                if max <= tier.min_sales_amount {
                    return Err(ServiceError::invalid_argument(format!(
                        "tier {} upper bound must exceed its lower bound",
                        index + 1
                    )));
                }
                if next.min_sales_amount != max {
                    return Err(ServiceError::invalid_argument(format!(
                        "tier {} must start where tier {} ends (no gaps or overlaps)",
                        index + 2,
                        index + 1
                    )));
                }
            }
            (None, Some(_)) => {
                return Err(ServiceError::invalid_argument(format!(
                    "tier {} is open-ended but is not the last tier",
                    index + 1
                )));
            }
            (Some(_), None) => {
                return Err(ServiceError::invalid_argument(
                    "the last tier must be open-ended to cover all sales",
                ));
            }
            (None, None) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(min: &str, max: Option<&str>, rate: &str) -> TierSpec {
        TierSpec {
            min_sales_amount: Money::parse(min).unwrap(),
            max_sales_amount: max.map(|m| Money::parse(m).unwrap()),
            commission_rate: Rate::parse(rate).unwrap(),
        }
    }

    #[test]
    fn accepts_contiguous_table() {
        let tiers = vec![
            tier("0", Some("1000"), "5"),
            tier("1000", Some("5000"), "7.5"),
            tier("5000", None, "10"),
        ];
        assert!(validate_tiers(&tiers).is_ok());
    }

    #[test]
    fn accepts_single_open_tier() {
        assert!(validate_tiers(&[tier("0", None, "5")]).is_ok());
    }

    #[test]
    fn rejects_empty_table() {
        assert!(validate_tiers(&[]).is_err());
    }

    #[test]
    fn rejects_nonzero_start() {
        assert!(validate_tiers(&[tier("100", None, "5")]).is_err());
    }

    #[test]
    fn rejects_gap() {
        let tiers = vec![tier("0", Some("1000"), "5"), tier("1500", None, "10")];
        assert!(validate_tiers(&tiers).is_err());
    }

    #[test]
    fn rejects_overlap() {
        let tiers = vec![tier("0", Some("1000"), "5"), tier("800", None, "10")];
        assert!(validate_tiers(&tiers).is_err());
    }

    #[test]
    fn rejects_bounded_tail() {
        let tiers = vec![tier("0", Some("1000"), "5"), tier("1000", Some("2000"), "10")];
        assert!(validate_tiers(&tiers).is_err());
    }

    #[test]
    fn rejects_inverted_band() {
        let tiers = vec![tier("0", Some("0"), "5"), tier("0", None, "10")];
        assert!(validate_tiers(&tiers).is_err());
    }
}
