//! Request and response types for the POS service.

use serde::{Deserialize, Serialize};

use mercur_core::money::Money;
use mercur_core::pagination::{PageRequest, Pagination};
use mercur_core::types::{DocumentType, PaidStatus};
use mercur_core::validation::DateRange;

use super::model::{Cart, CartItem, Discount, OrderDocument, OrderItem, PaymentType, PosProduct, ProductGroup};

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: PosProduct,
    pub product_group: Option<ProductGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductGroupView {
    #[serde(flatten)]
    pub group: ProductGroup,
    pub products: Vec<PosProduct>,
}

/// One node of the group tree; children are nested recursively.
#[derive(Debug, Clone, Serialize)]
pub struct ProductGroupTree {
    #[serde(flatten)]
    pub group: ProductGroup,
    pub child_groups: Vec<ProductGroupTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Option<ProductView>,
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<ProductView>,
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub document: OrderDocument,
    pub order_items: Vec<OrderItemView>,
    pub payment_type: Option<PaymentType>,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductsRequest {
    pub is_active: Option<bool>,
    pub product_group_id: Option<i32>,
    pub search_term: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListProductsResponse {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductGroupsRequest {
    pub is_active: Option<bool>,
    pub parent_group_id: Option<i32>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListProductGroupsResponse {
    pub product_groups: Vec<ProductGroupView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPaymentTypesRequest {
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPaymentTypesResponse {
    pub payment_types: Vec<PaymentType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDiscountsRequest {
    pub is_active: Option<bool>,
    pub product_id: Option<i32>,
    /// Matches discount, product or product-group names.
    pub search_term: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDiscountsResponse {
    pub discounts: Vec<Discount>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateDiscountRequest {
    pub discount_id: i32,
    pub product_id: Option<i32>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateDiscountResponse {
    pub is_valid: bool,
    pub reason: Option<String>,
    pub calculated_discount_amount: Money,
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCartRequest {
    pub cashier_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemToCartRequest {
    pub cart_id: i64,
    pub product_id: i32,
    pub quantity: i32,
    pub serving_employee_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveItemFromCartRequest {
    pub cart_id: i64,
    pub item_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyDiscountRequest {
    pub cart_id: i64,
    pub discount_id: i32,
    /// Explicit target items; empty means auto-select by the discount's
    /// product/group scope.
    #[serde(default)]
    pub item_ids: Vec<i64>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i32,
    pub quantity: i32,
    pub serving_employee_id: Option<i64>,
    pub discount_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub document_number: String,
    pub cashier_id: i64,
    pub document_type: DocumentType,
    pub order_items: Vec<OrderItemRequest>,
    pub additional_info: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderFromCartRequest {
    pub cart_id: i64,
    pub document_number: String,
    pub additional_info: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListOrdersRequest {
    pub cashier_id: Option<i64>,
    pub document_type: Option<DocumentType>,
    pub paid_status: Option<PaidStatus>,
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListOrdersResponse {
    pub order_documents: Vec<OrderView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessPaymentRequest {
    pub order_id: i64,
    pub payment_type_id: i32,
    /// Amount tendered, wire format.
    pub paid_amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessPaymentResponse {
    pub order_document: OrderView,
    pub change_amount: Money,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoidOrderRequest {
    pub id: i64,
    pub voided_by: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnOrderRequest {
    pub original_order_id: i64,
    pub processed_by: i64,
    /// Items of the original order to mirror into the return document.
    pub item_ids: Vec<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnOrderResponse {
    pub return_document: OrderView,
}
