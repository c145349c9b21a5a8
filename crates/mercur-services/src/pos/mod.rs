//! POS order engine: catalog, cart lifecycle, order composition and
//! pricing, payment, void/return, and order-event publication.

pub mod cart;
pub mod catalog;
pub mod messages;
pub mod model;
pub mod orders;
pub mod pricing;

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::warn;

use mercur_cache::{Cache, EventPublisher, OrderEvent, OrderEventType};
use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::Rate;
use mercur_core::types::PaidStatus;
use mercur_db::Database;

use self::messages::{CartItemView, CartView, OrderItemView, OrderView, ProductView};
use self::model::{
    Cart, CartItem, Discount, OrderDocument, OrderItem, PaymentType, PosProduct, ProductGroup,
};

pub(crate) const PRODUCT_COLUMNS: &str = "id, product_code, product_name, product_price, \
     cost_price, product_group_id, commission_eligible, requires_service_employee, is_active, \
     created_at, updated_at";

pub(crate) const GROUP_COLUMNS: &str = "id, product_group_name, parent_group_id, color, \
     image_url, commission_rate, is_active, created_at, updated_at";

pub(crate) const PAYMENT_TYPE_COLUMNS: &str =
    "id, payment_name, is_active, processing_fee_rate, created_at, updated_at";

pub(crate) const DISCOUNT_COLUMNS: &str = "id, discount_name, discount_type, discount_value, \
     product_id, product_group_id, min_quantity, max_usage_per_transaction, valid_from, \
     valid_until, is_active, created_at, updated_at";

pub(crate) const CART_COLUMNS: &str = "id, cashier_id, status, subtotal, tax_amount, \
     discount_amount, total_amount, created_at, updated_at";

pub(crate) const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, serving_employee_id, \
     quantity, unit_price, discount_id, discount_amount, line_total, created_at";

pub(crate) const ORDER_COLUMNS: &str = "id, document_number, cashier_id, orders_date, \
     document_type, payment_type_id, subtotal, tax_amount, discount_amount, total_amount, \
     paid_amount, change_amount, paid_status, additional_info, notes, created_at, updated_at";

pub(crate) const ORDER_ITEM_COLUMNS: &str = "id, document_id, product_id, serving_employee_id, \
     quantity, unit_price, price_before_discount, discount_id, discount_amount, line_total, \
     commission_amount, created_at";

/// Order engine service. Cloning shares the pool, cache and publisher.
#[derive(Clone)]
pub struct PosService {
    pub(crate) db: Database,
    pub(crate) cache: Cache,
    pub(crate) events: EventPublisher,
    /// Engine tax rate as a percentage (configurable, default 10).
    pub(crate) tax_rate: Rate,
}

impl PosService {
    pub fn new(db: Database, cache: Cache, events: EventPublisher, tax_rate: Rate) -> Self {
        PosService {
            db,
            cache,
            events,
            tax_rate,
        }
    }

    /// Drops the POS lookup caches plus any per-product entries. Called by
    /// catalog administration flows; exposed for them here.
    pub async fn invalidate_pos_caches(&self, product_ids: &[i32]) {
        use mercur_cache::cache::*;

        let mut keys = vec![
            POS_PRODUCT_KEY.to_string(),
            POS_PRODUCT_GROUP_KEY.to_string(),
        ];
        keys.extend(product_ids.iter().map(|id| pos_product_key(*id)));
        self.cache.invalidate(&keys).await;
    }

    /// Publishes an order event carrying the full order snapshot.
    /// Best-effort: a broker failure is logged and swallowed.
    pub(crate) async fn publish_order_event(
        &self,
        event_type: OrderEventType,
        order: &OrderView,
        acting_cashier: i64,
    ) {
        let order_data = match serde_json::to_value(order) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(order_id = order.document.id, error = %e, "failed to snapshot order for event");
                None
            }
        };
        let event = OrderEvent::new(
            event_type,
            order.document.id,
            order.document.document_number.clone(),
            acting_cashier,
            order.document.total_amount,
            order.document.paid_status,
            order.document.document_type,
            order_data,
        );
        self.events.publish(event_type, &event).await;
    }

    // =========================================================================
    // Eager-loading helpers
    //
    // Object graphs are owned-by-id; views are assembled by loading the
    // related rows for a batch of ids rather than via bidirectional
    // pointers.
    // =========================================================================

    pub(crate) async fn load_order_view(
        &self,
        conn: &mut PgConnection,
        order_id: i64,
    ) -> ServiceResult<OrderView> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM pos.order_documents WHERE id = $1");
        let document: OrderDocument = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("order not found"))?;

        let sql = format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM pos.order_items WHERE document_id = $1 ORDER BY id"
        );
        let items: Vec<OrderItem> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

        let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
        let discount_ids: Vec<i32> = items.iter().filter_map(|i| i.discount_id).collect();
        let products = self.load_product_views(conn, &product_ids).await?;
        let discounts = load_discounts_by_ids(conn, &discount_ids).await?;

        let payment_type = match document.payment_type_id {
            Some(id) => {
                let sql =
                    format!("SELECT {PAYMENT_TYPE_COLUMNS} FROM pos.payment_types WHERE id = $1");
                sqlx::query_as::<_, PaymentType>(&sql)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            None => None,
        };

        let order_items = items
            .into_iter()
            .map(|item| {
                let product = products.get(&item.product_id).cloned();
                let discount = item.discount_id.and_then(|id| discounts.get(&id).cloned());
                OrderItemView {
                    item,
                    product,
                    discount,
                }
            })
            .collect();

        Ok(OrderView {
            document,
            order_items,
            payment_type,
        })
    }

    pub(crate) async fn load_cart_view(
        &self,
        conn: &mut PgConnection,
        cart_id: i64,
    ) -> ServiceResult<CartView> {
        let sql = format!("SELECT {CART_COLUMNS} FROM pos.carts WHERE id = $1");
        let cart: Cart = sqlx::query_as(&sql)
            .bind(cart_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("cart not found"))?;

        let sql = format!(
            "SELECT {CART_ITEM_COLUMNS} FROM pos.cart_items WHERE cart_id = $1 ORDER BY id"
        );
        let items: Vec<CartItem> = sqlx::query_as(&sql)
            .bind(cart_id)
            .fetch_all(&mut *conn)
            .await?;

        let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
        let discount_ids: Vec<i32> = items.iter().filter_map(|i| i.discount_id).collect();
        let products = self.load_product_views(conn, &product_ids).await?;
        let discounts = load_discounts_by_ids(conn, &discount_ids).await?;

        let items = items
            .into_iter()
            .map(|item| {
                let product = products.get(&item.product_id).cloned();
                let discount = item.discount_id.and_then(|id| discounts.get(&id).cloned());
                CartItemView {
                    item,
                    product,
                    discount,
                }
            })
            .collect();

        Ok(CartView { cart, items })
    }

    /// Loads products with their groups for a set of ids.
    pub(crate) async fn load_product_views(
        &self,
        conn: &mut PgConnection,
        product_ids: &[i32],
    ) -> ServiceResult<HashMap<i32, ProductView>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM pos.products WHERE id = ANY($1)");
        let products: Vec<PosProduct> = sqlx::query_as(&sql)
            .bind(product_ids.to_vec())
            .fetch_all(&mut *conn)
            .await?;

        let group_ids: Vec<i32> = products.iter().filter_map(|p| p.product_group_id).collect();
        let groups = load_groups_by_ids(conn, &group_ids).await?;

        Ok(products
            .into_iter()
            .map(|p| {
                let product_group = p.product_group_id.and_then(|id| groups.get(&id).cloned());
                (
                    p.id,
                    ProductView {
                        product: p,
                        product_group,
                    },
                )
            })
            .collect())
    }
}

pub(crate) async fn load_groups_by_ids(
    conn: &mut PgConnection,
    group_ids: &[i32],
) -> ServiceResult<HashMap<i32, ProductGroup>> {
    if group_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!("SELECT {GROUP_COLUMNS} FROM pos.product_groups WHERE id = ANY($1)");
    let groups: Vec<ProductGroup> = sqlx::query_as(&sql)
        .bind(group_ids.to_vec())
        .fetch_all(&mut *conn)
        .await?;
    Ok(groups.into_iter().map(|g| (g.id, g)).collect())
}

pub(crate) async fn load_discounts_by_ids(
    conn: &mut PgConnection,
    discount_ids: &[i32],
) -> ServiceResult<HashMap<i32, Discount>> {
    if discount_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM pos.discounts WHERE id = ANY($1)");
    let discounts: Vec<Discount> = sqlx::query_as(&sql)
        .bind(discount_ids.to_vec())
        .fetch_all(&mut *conn)
        .await?;
    Ok(discounts.into_iter().map(|d| (d.id, d)).collect())
}

/// True when the order's paid status means "already paid".
pub(crate) fn is_paid(status: PaidStatus) -> bool {
    status == PaidStatus::Paid
}
