//! Cart lifecycle: OPEN carts accept item add/remove and discount
//! application; CHECKED_OUT carts are immutable.
//!
//! Every mutation runs in one transaction with the cart row locked
//! `FOR UPDATE`, and finishes by recomputing the cart totals from its
//! items.

use chrono::Utc;
use sqlx::PgConnection;

use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::Rate;
use mercur_core::types::CartStatus;
use mercur_core::validation::{require_id, require_positive};

use super::messages::*;
use super::model::{Cart, CartItem, Discount, PosProduct};
use super::{pricing, PosService, CART_COLUMNS, CART_ITEM_COLUMNS, DISCOUNT_COLUMNS, PRODUCT_COLUMNS};

impl PosService {
    pub async fn create_cart(&self, req: CreateCartRequest) -> ServiceResult<CartView> {
        require_id("cashier_id", req.cashier_id)?;

        let sql = format!(
            "INSERT INTO pos.carts (cashier_id, status) VALUES ($1, $2) RETURNING {CART_COLUMNS}"
        );
        let cart: Cart = sqlx::query_as(&sql)
            .bind(req.cashier_id)
            .bind(CartStatus::Open)
            .fetch_one(self.db.pool())
            .await?;

        Ok(CartView {
            cart,
            items: Vec::new(),
        })
    }

    pub async fn get_cart(&self, cart_id: i64) -> ServiceResult<CartView> {
        require_id("cart_id", cart_id)?;
        let mut conn = self.db.pool().acquire().await?;
        self.load_cart_view(&mut conn, cart_id).await
    }

    /// Adds a product to an OPEN cart. An existing line for the same
    /// product is incremented instead of duplicated.
    pub async fn add_item_to_cart(&self, req: AddItemToCartRequest) -> ServiceResult<CartView> {
        require_id("cart_id", req.cart_id)?;
        require_id("product_id", i64::from(req.product_id))?;
        require_positive("quantity", req.quantity)?;

        let mut tx = self.db.pool().begin().await?;
        lock_open_cart(&mut tx, req.cart_id).await?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM pos.products WHERE id = $1 AND is_active = TRUE"
        );
        let product: PosProduct = sqlx::query_as(&sql)
            .bind(req.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("product not found or inactive"))?;

        if product.requires_service_employee && req.serving_employee_id.is_none() {
            return Err(ServiceError::invalid_argument(
                "this product requires a service employee",
            ));
        }

        let sql = format!(
            "SELECT {CART_ITEM_COLUMNS} FROM pos.cart_items \
             WHERE cart_id = $1 AND product_id = $2 FOR UPDATE"
        );
        let existing: Option<CartItem> = sqlx::query_as(&sql)
            .bind(req.cart_id)
            .bind(req.product_id)
            .fetch_optional(&mut *tx)
            .await?;

        match existing {
            Some(item) => {
                // Incrementing resets the line to its undiscounted total;
                // the discount fields are left untouched.
                let quantity = item.quantity + req.quantity;
                let line_total = item.unit_price.times(quantity);
                sqlx::query(
                    "UPDATE pos.cart_items SET quantity = $2, line_total = $3 WHERE id = $1",
                )
                .bind(item.id)
                .bind(quantity)
                .bind(line_total)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                let line_total = product.product_price.times(req.quantity);
                sqlx::query(
                    "INSERT INTO pos.cart_items \
                     (cart_id, product_id, serving_employee_id, quantity, unit_price, \
                      discount_amount, line_total) \
                     VALUES ($1, $2, $3, $4, $5, 0, $6)",
                )
                .bind(req.cart_id)
                .bind(req.product_id)
                .bind(req.serving_employee_id)
                .bind(req.quantity)
                .bind(product.product_price)
                .bind(line_total)
                .execute(&mut *tx)
                .await?;
            }
        }

        recompute_cart_totals(&mut tx, req.cart_id, self.tax_rate).await?;
        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        self.load_cart_view(&mut conn, req.cart_id).await
    }

    pub async fn remove_item_from_cart(
        &self,
        req: RemoveItemFromCartRequest,
    ) -> ServiceResult<CartView> {
        require_id("cart_id", req.cart_id)?;
        require_id("item_id", req.item_id)?;

        let mut tx = self.db.pool().begin().await?;
        lock_open_cart(&mut tx, req.cart_id).await?;

        let result = sqlx::query("DELETE FROM pos.cart_items WHERE id = $1 AND cart_id = $2")
            .bind(req.item_id)
            .bind(req.cart_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("cart item not found"));
        }

        recompute_cart_totals(&mut tx, req.cart_id, self.tax_rate).await?;
        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        self.load_cart_view(&mut conn, req.cart_id).await
    }

    /// Applies a discount to explicit items, or to every cart item matching
    /// the discount's product/group scope.
    pub async fn apply_discount(&self, req: ApplyDiscountRequest) -> ServiceResult<CartView> {
        require_id("cart_id", req.cart_id)?;
        require_id("discount_id", i64::from(req.discount_id))?;

        let mut tx = self.db.pool().begin().await?;
        lock_open_cart(&mut tx, req.cart_id).await?;

        let sql = format!(
            "SELECT {DISCOUNT_COLUMNS} FROM pos.discounts WHERE id = $1 AND is_active = TRUE"
        );
        let discount: Discount = sqlx::query_as(&sql)
            .bind(req.discount_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("discount not found or inactive"))?;

        let now = Utc::now();
        if let Some(from) = discount.valid_from {
            if now < from {
                return Err(ServiceError::precondition("discount is not yet valid"));
            }
        }
        if let Some(until) = discount.valid_until {
            if now > until {
                return Err(ServiceError::precondition("discount has expired"));
            }
        }

        let item_ids: Vec<i64> = if !req.item_ids.is_empty() {
            req.item_ids.clone()
        } else {
            // Auto-select by scope: direct product match, group membership
            // via the product, or every item when the discount is global.
            sqlx::query_scalar(
                "SELECT ci.id FROM pos.cart_items ci \
                 JOIN pos.products p ON p.id = ci.product_id \
                 WHERE ci.cart_id = $1 \
                   AND ($2::integer IS NULL OR ci.product_id = $2) \
                   AND ($3::integer IS NULL OR p.product_group_id = $3) \
                 ORDER BY ci.id",
            )
            .bind(req.cart_id)
            .bind(discount.product_id)
            .bind(discount.product_group_id)
            .fetch_all(&mut *tx)
            .await?
        };

        let mut applied = 0usize;
        for item_id in item_ids {
            let sql = format!(
                "SELECT {CART_ITEM_COLUMNS} FROM pos.cart_items \
                 WHERE id = $1 AND cart_id = $2 FOR UPDATE"
            );
            let item: Option<CartItem> = sqlx::query_as(&sql)
                .bind(item_id)
                .bind(req.cart_id)
                .fetch_optional(&mut *tx)
                .await?;
            let item = match item {
                Some(item) => item,
                None => continue,
            };
            if item.quantity < discount.min_quantity {
                continue;
            }

            let discount_amount = pricing::discount_amount(
                discount.discount_type,
                discount.discount_value,
                item.unit_price,
                item.quantity,
                discount.min_quantity,
            );
            let line_total = item.unit_price.times(item.quantity) - discount_amount;

            sqlx::query(
                "UPDATE pos.cart_items SET discount_id = $2, discount_amount = $3, \
                 line_total = $4 WHERE id = $1",
            )
            .bind(item.id)
            .bind(discount.id)
            .bind(discount_amount)
            .bind(line_total)
            .execute(&mut *tx)
            .await?;
            applied += 1;
        }

        if applied == 0 {
            return Err(ServiceError::precondition(
                "no eligible items found for this discount",
            ));
        }

        recompute_cart_totals(&mut tx, req.cart_id, self.tax_rate).await?;
        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        self.load_cart_view(&mut conn, req.cart_id).await
    }
}

/// Locks an OPEN cart row; checked-out or missing carts read as not found.
pub(crate) async fn lock_open_cart(conn: &mut PgConnection, cart_id: i64) -> ServiceResult<Cart> {
    let sql = format!(
        "SELECT {CART_COLUMNS} FROM pos.carts WHERE id = $1 AND status = $2 FOR UPDATE"
    );
    sqlx::query_as(&sql)
        .bind(cart_id)
        .bind(CartStatus::Open)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("cart not found or inactive"))
}

/// Recomputes the cart header amounts from its items.
pub(crate) async fn recompute_cart_totals(
    conn: &mut PgConnection,
    cart_id: i64,
    tax_rate: Rate,
) -> ServiceResult<()> {
    let rows: Vec<(mercur_core::Money, mercur_core::Money)> =
        sqlx::query_as("SELECT line_total, discount_amount FROM pos.cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .fetch_all(&mut *conn)
            .await?;

    // pre_discount is the undiscounted line amount.
    let lines: Vec<_> = rows
        .into_iter()
        .map(|(line_total, discount)| (line_total + discount, discount))
        .collect();
    let totals = pricing::totals(&lines, tax_rate);

    sqlx::query(
        "UPDATE pos.carts SET subtotal = $2, discount_amount = $3, tax_amount = $4, \
         total_amount = $5, updated_at = NOW() WHERE id = $1",
    )
    .bind(cart_id)
    .bind(totals.subtotal)
    .bind(totals.discount)
    .bind(totals.tax)
    .bind(totals.total)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
