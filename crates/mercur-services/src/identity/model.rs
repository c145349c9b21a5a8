//! Row types for the `directory` schema.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use mercur_core::money::{Money, Rate};
use mercur_core::types::CommissionType;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 hash, never returned to callers.
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub role_id: i32,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, serde::Serialize, serde::Deserialize)]
pub struct Role {
    pub id: i32,
    pub role_name: String,
    pub access_level: i32,
    /// Opaque permission text interpreted by the gateway.
    pub permissions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Employee {
    pub id: i64,
    pub employee_name: String,
    pub position: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub hire_date: Option<NaiveDate>,
    pub base_salary: Money,
    pub commission_rate: Rate,
    pub commission_type: CommissionType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, serde::Serialize, serde::Deserialize)]
pub struct CommissionTier {
    pub id: i32,
    pub employee_id: i64,
    pub min_sales_amount: Money,
    /// `None` means the band is open-ended.
    pub max_sales_amount: Option<Money>,
    pub commission_rate: Rate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
