//! Row types for the `commission` schema.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mercur_core::money::{Money, Rate};
use mercur_core::types::CommissionStatus;

/// Commission header aggregating per-item details for one employee period.
///
/// `bonus_commission` is modeled but never populated by any path; it stays
/// zero.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionCalculation {
    pub id: i64,
    pub employee_id: i64,
    pub calculation_period_start: NaiveDate,
    pub calculation_period_end: NaiveDate,
    pub total_sales: Money,
    pub base_commission: Money,
    pub bonus_commission: Money,
    pub total_commission: Money,
    pub status: CommissionStatus,
    pub calculated_by: i64,
    pub approved_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionDetail {
    pub id: i64,
    pub commission_calculation_id: i64,
    pub order_item_id: i64,
    pub product_id: i32,
    pub sales_amount: Money,
    pub commission_rate: Rate,
    pub commission_amount: Money,
    pub product_name: Option<String>,
    pub order_document_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// At most one payment per calculation (unique key on
/// `commission_calculation_id`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionPayment {
    pub id: i64,
    pub commission_calculation_id: i64,
    pub employee_id: i64,
    pub payment_amount: Money,
    pub payment_date: NaiveDate,
    pub payment_type_id: i32,
    pub reference_number: Option<String>,
    pub paid_by: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
