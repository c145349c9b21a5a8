//! # Domain Enumerations
//!
//! The closed tag sets shared by the four services. Every one of these is a
//! polymorphism-by-tag enumeration: variants carry explicit integer
//! representations (matching the wire numbering) and call sites match
//! exhaustively.
//!
//! `CartStatus` is the one zero-origin tag set: an open cart is literally
//! stored as `0` and a checked-out cart as `1`.

use serde::{Deserialize, Serialize};

macro_rules! tagged_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[repr(i32)]
        pub enum $name {
            $($variant = $tag),+
        }

        impl $name {
            /// The wire tag for this variant.
            pub const fn as_i32(self) -> i32 {
                self as i32
            }

            /// Decodes a wire tag; unknown tags return `None`.
            pub const fn from_i32(tag: i32) -> Option<Self> {
                match tag {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

tagged_enum! {
    /// The kind of order document (spec: SALE, VOID, RETURN).
    DocumentType {
        Sale = 1,
        Void = 2,
        Return = 3,
    }
}

tagged_enum! {
    /// Payment state of an order document.
    PaidStatus {
        Pending = 1,
        Paid = 2,
        Refunded = 3,
    }
}

tagged_enum! {
    /// Cart lifecycle: OPEN accepts mutations, CHECKED_OUT is immutable.
    CartStatus {
        Open = 0,
        CheckedOut = 1,
    }
}

tagged_enum! {
    /// Direction of a stock movement journal entry.
    MovementType {
        In = 1,
        Out = 2,
        Transfer = 3,
        Adjustment = 4,
    }
}

tagged_enum! {
    /// What a stock movement correlates to.
    ReferenceType {
        Purchase = 1,
        Sale = 2,
        Transfer = 3,
        Adjustment = 4,
        Return = 5,
    }
}

tagged_enum! {
    /// How a discount computes its amount.
    DiscountType {
        Percentage = 1,
        FixedAmount = 2,
        BuyXGetY = 3,
    }
}

tagged_enum! {
    /// How an employee's commission is computed.
    CommissionType {
        Percentage = 1,
        Tiered = 2,
        FixedAmount = 3,
    }
}

tagged_enum! {
    /// Approval/payment state machine of a commission calculation.
    CommissionStatus {
        Draft = 1,
        Calculated = 2,
        Approved = 3,
        Paid = 4,
    }
}

impl CommissionStatus {
    /// Human-readable name used in precondition error messages.
    pub const fn name(self) -> &'static str {
        match self {
            CommissionStatus::Draft => "DRAFT",
            CommissionStatus::Calculated => "CALCULATED",
            CommissionStatus::Approved => "APPROVED",
            CommissionStatus::Paid => "PAID",
        }
    }
}

/// Payment type id 1 is cash by convention; cash payments must tender at
/// least the order total and produce change.
pub const CASH_PAYMENT_TYPE_ID: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        assert_eq!(DocumentType::Sale.as_i32(), 1);
        assert_eq!(DocumentType::from_i32(3), Some(DocumentType::Return));
        assert_eq!(DocumentType::from_i32(0), None);

        assert_eq!(CartStatus::Open.as_i32(), 0);
        assert_eq!(CartStatus::from_i32(1), Some(CartStatus::CheckedOut));

        assert_eq!(PaidStatus::from_i32(2), Some(PaidStatus::Paid));
        assert_eq!(MovementType::from_i32(4), Some(MovementType::Adjustment));
        assert_eq!(ReferenceType::from_i32(5), Some(ReferenceType::Return));
        assert_eq!(CommissionStatus::from_i32(4), Some(CommissionStatus::Paid));
    }

    #[test]
    fn serde_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&DiscountType::BuyXGetY).unwrap(),
            "\"buy_x_get_y\""
        );
        let ct: CommissionType = serde_json::from_str("\"fixed_amount\"").unwrap();
        assert_eq!(ct, CommissionType::FixedAmount);
    }
}
