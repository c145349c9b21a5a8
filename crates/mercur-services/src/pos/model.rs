//! Row types for the `pos` schema.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mercur_core::money::{Money, Rate};
use mercur_core::types::{CartStatus, DiscountType, DocumentType, PaidStatus};

/// POS-local product (distinct from the inventory product master).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PosProduct {
    pub id: i32,
    pub product_code: String,
    pub product_name: String,
    pub product_price: Money,
    pub cost_price: Money,
    pub product_group_id: Option<i32>,
    pub commission_eligible: bool,
    /// When set, sale lines must carry a serving employee.
    pub requires_service_employee: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductGroup {
    pub id: i32,
    pub product_group_name: String,
    pub parent_group_id: Option<i32>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub commission_rate: Rate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentType {
    pub id: i32,
    pub payment_name: String,
    pub is_active: bool,
    pub processing_fee_rate: Rate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Discount rule. `discount_value` is interpreted per `discount_type`:
/// a percentage, a per-unit amount, or a free-item count.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Discount {
    pub id: i32,
    pub discount_name: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub product_id: Option<i32>,
    pub product_group_id: Option<i32>,
    pub min_quantity: i32,
    pub max_usage_per_transaction: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// True when the discount is inside its validity window at `now`.
    pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now > until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub cashier_id: i64,
    pub status: CartStatus,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i32,
    pub serving_employee_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: Money,
    pub discount_id: Option<i32>,
    pub discount_amount: Money,
    pub line_total: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderDocument {
    pub id: i64,
    pub document_number: String,
    pub cashier_id: i64,
    pub orders_date: DateTime<Utc>,
    pub document_type: DocumentType,
    pub payment_type_id: Option<i32>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub change_amount: Money,
    pub paid_status: PaidStatus,
    pub additional_info: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line. `quantity` is signed: return mirrors carry the negated
/// original quantity.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub document_id: i64,
    pub product_id: i32,
    pub serving_employee_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: Money,
    pub price_before_discount: Money,
    pub discount_id: Option<i32>,
    pub discount_amount: Money,
    pub line_total: Money,
    pub commission_amount: Money,
    pub created_at: DateTime<Utc>,
}
