//! Row types for the `inventory` schema.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mercur_core::money::Money;
use mercur_core::types::{MovementType, ReferenceType};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryProduct {
    pub id: i32,
    pub product_code: String,
    pub product_name: String,
    pub product_type_id: i32,
    pub supplier_id: i32,
    pub unit_of_measure: String,
    /// Low-stock threshold; 0 means "use the engine default".
    pub reorder_level: i32,
    pub max_stock_level: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i32,
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub location: Option<String>,
    pub manager_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i32,
    pub supplier_code: String,
    pub supplier_name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductType {
    pub id: i32,
    pub product_type_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One balance row per (product, warehouse).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub product_id: i32,
    pub warehouse_id: i32,
    pub available_quantity: i32,
    pub reserved_quantity: i32,
    pub unit_cost: Money,
    pub last_restock_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only journal entry. Quantities are signed: IN and reserve entries
/// are positive, OUT, release and transfer-out entries are negative, so the
/// per-(product, warehouse) sum reconciles against the balance row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i32,
    pub warehouse_id: i32,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub unit_cost: Option<Money>,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}
