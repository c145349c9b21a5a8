//! Request and response types for the inventory service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mercur_core::money::Money;
use mercur_core::pagination::{PageRequest, Pagination};
use mercur_core::types::{MovementType, ReferenceType};
use mercur_core::validation::DateRange;

use super::model::{InventoryProduct, ProductType, Stock, StockMovement, Supplier, Warehouse};

// =============================================================================
// Views
// =============================================================================

/// A stock row joined with its product and warehouse context.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockView {
    pub id: i64,
    pub product_id: i32,
    pub warehouse_id: i32,
    pub available_quantity: i32,
    pub reserved_quantity: i32,
    pub unit_cost: Money,
    pub last_restock_date: Option<NaiveDate>,
    pub warehouse_name: Option<String>,
    pub product_name: Option<String>,
    /// The effective low-stock threshold when listing low stock.
    pub reorder_level: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: InventoryProduct,
    pub product_type: Option<ProductType>,
    pub supplier: Option<Supplier>,
    pub stocks: Vec<Stock>,
}

// =============================================================================
// Product master data
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub product_code: String,
    pub product_name: String,
    #[serde(default)]
    pub product_type_id: i32,
    #[serde(default)]
    pub supplier_id: i32,
    #[serde(default)]
    pub unit_of_measure: String,
    #[serde(default)]
    pub reorder_level: i32,
    #[serde(default)]
    pub max_stock_level: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub id: i32,
    pub product_name: Option<String>,
    pub product_type_id: Option<i32>,
    pub supplier_id: Option<i32>,
    pub unit_of_measure: Option<String>,
    pub reorder_level: Option<i32>,
    pub max_stock_level: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductsRequest {
    pub is_active: Option<bool>,
    pub product_type_id: Option<i32>,
    pub supplier_id: Option<i32>,
    /// Matches product code, name or unit of measure; composes with the
    /// other filters.
    pub search_term: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListProductsResponse {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

// =============================================================================
// Stock operations
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CheckStockRequest {
    pub product_id: i32,
    pub warehouse_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckStockResponse {
    pub is_available: bool,
    pub total_available_quantity: i32,
    pub stock_details: Vec<StockView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveStockRequest {
    pub product_id: i32,
    pub warehouse_id: i32,
    pub quantity: i32,
    pub reserved_by: i64,
    /// Correlation id recorded on the movement row.
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseStockRequest {
    pub product_id: i32,
    pub warehouse_id: i32,
    pub quantity: i32,
    pub released_by: i64,
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStockRequest {
    pub product_id: i32,
    pub warehouse_id: i32,
    /// Positive for IN/OUT; ADJUSTMENT accepts a signed delta.
    pub quantity: i32,
    pub movement_type: MovementType,
    pub reference_type: ReferenceType,
    pub unit_cost: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
}

/// Result of a single-row stock mutation.
#[derive(Debug, Clone, Serialize)]
pub struct StockMutationResponse {
    pub updated_stock: Stock,
    pub stock_movement: StockMovement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferStockRequest {
    pub product_id: i32,
    pub from_warehouse_id: i32,
    pub to_warehouse_id: i32,
    pub quantity: i32,
    pub transferred_by: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferStockResponse {
    /// Outbound then inbound movement, sharing one reference id.
    pub stock_movements: Vec<StockMovement>,
    pub source_stock: Stock,
    pub destination_stock: Stock,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetStockRequest {
    pub product_id: i32,
    pub warehouse_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetStockResponse {
    pub stocks: Vec<StockView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLowStockRequest {
    pub warehouse_id: Option<i32>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListLowStockResponse {
    pub low_stocks: Vec<StockView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListStockMovementsRequest {
    pub product_id: Option<i32>,
    pub warehouse_id: Option<i32>,
    pub movement_type: Option<MovementType>,
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListStockMovementsResponse {
    pub stock_movements: Vec<StockMovement>,
    pub pagination: Pagination,
}

// =============================================================================
// Warehouses, suppliers, product types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWarehouseRequest {
    pub warehouse_code: String,
    pub warehouse_name: String,
    pub location: Option<String>,
    pub manager_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListWarehousesRequest {
    pub is_active: Option<bool>,
    pub warehouse_code: Option<String>,
    pub warehouse_name: Option<String>,
    pub search_term: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListWarehousesResponse {
    pub warehouses: Vec<Warehouse>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSupplierRequest {
    pub supplier_code: String,
    pub supplier_name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSuppliersRequest {
    pub is_active: Option<bool>,
    pub supplier_code: Option<String>,
    pub supplier_name: Option<String>,
    pub search_term: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSuppliersResponse {
    pub suppliers: Vec<Supplier>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductTypeRequest {
    pub product_type_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductTypesRequest {
    pub search_term: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListProductTypesResponse {
    pub product_types: Vec<ProductType>,
    pub pagination: Pagination,
}
