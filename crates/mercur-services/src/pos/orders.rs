//! Order lifecycle: creation (direct and from cart), payment, void and
//! return.
//!
//! Every mutation is one transaction; events are published after the
//! commit, best-effort. Document numbers are unique, enforced both by an
//! upfront check and by the unique index (the conflict detector under
//! concurrent creation).

use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

use mercur_cache::OrderEventType;
use mercur_core::error::{is_unique_violation, ServiceError, ServiceResult};
use mercur_core::money::Money;
use mercur_core::pagination::Pagination;
use mercur_core::types::{DocumentType, PaidStatus, CASH_PAYMENT_TYPE_ID};
use mercur_core::validation::{require_id, require_str};

use super::messages::*;
use super::model::{Discount, OrderDocument, OrderItem, PosProduct, ProductGroup};
use super::{
    is_paid, pricing, PosService, DISCOUNT_COLUMNS, GROUP_COLUMNS, ORDER_COLUMNS,
    ORDER_ITEM_COLUMNS, PRODUCT_COLUMNS,
};

impl PosService {
    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an order from explicit item lines, pricing each line and the
    /// document atomically, then publishes `order.created`.
    pub async fn create_order(&self, req: CreateOrderRequest) -> ServiceResult<OrderView> {
        let document_number = require_str("document_number", &req.document_number)?.to_string();
        require_id("cashier_id", req.cashier_id)?;
        if req.order_items.is_empty() {
            return Err(ServiceError::invalid_argument(
                "order must have at least one item",
            ));
        }
        for item in &req.order_items {
            require_id("product_id", i64::from(item.product_id))?;
            mercur_core::validation::require_positive("quantity", item.quantity)?;
        }

        self.ensure_document_number_free(&document_number).await?;

        let mut tx = self.db.pool().begin().await?;

        let document = insert_document(&mut tx, &document_number, &req).await?;

        let mut lines: Vec<(Money, Money)> = Vec::with_capacity(req.order_items.len());
        for item_req in &req.order_items {
            let (product, group) = load_active_product(&mut tx, item_req.product_id).await?;

            if product.requires_service_employee && item_req.serving_employee_id.is_none() {
                return Err(ServiceError::invalid_argument(format!(
                    "product '{}' requires a service employee",
                    product.product_name
                )));
            }

            let price_before_discount = product.product_price.times(item_req.quantity);

            let (discount_id, discount_amount) = match item_req.discount_id {
                Some(discount_id) => {
                    let amount = validate_item_discount(
                        &mut tx,
                        discount_id,
                        &product,
                        item_req.quantity,
                    )
                    .await?;
                    (Some(discount_id), amount)
                }
                None => (None, Money::ZERO),
            };

            let line_total = price_before_discount - discount_amount;
            let commission_amount = commission_for_line(&product, group.as_ref(), line_total);

            sqlx::query(
                "INSERT INTO pos.order_items \
                 (document_id, product_id, serving_employee_id, quantity, unit_price, \
                  price_before_discount, discount_id, discount_amount, line_total, \
                  commission_amount) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(document.id)
            .bind(item_req.product_id)
            .bind(item_req.serving_employee_id)
            .bind(item_req.quantity)
            .bind(product.product_price)
            .bind(price_before_discount)
            .bind(discount_id)
            .bind(discount_amount)
            .bind(line_total)
            .bind(commission_amount)
            .execute(&mut *tx)
            .await?;

            lines.push((price_before_discount, discount_amount));
        }

        let totals = pricing::totals(&lines, self.tax_rate);
        update_document_totals(&mut tx, document.id, &totals).await?;

        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        let order = self.load_order_view(&mut conn, document.id).await?;
        self.publish_order_event(OrderEventType::Created, &order, order.document.cashier_id)
            .await;

        info!(
            order_id = order.document.id,
            document_number = %order.document.document_number,
            total = %order.document.total_amount,
            "order created"
        );

        Ok(order)
    }

    /// Copies an OPEN cart's lines into a SALE order, flips the cart to
    /// CHECKED_OUT, all in one transaction.
    pub async fn create_order_from_cart(
        &self,
        req: CreateOrderFromCartRequest,
    ) -> ServiceResult<OrderView> {
        require_id("cart_id", req.cart_id)?;
        let document_number = require_str("document_number", &req.document_number)?.to_string();

        self.ensure_document_number_free(&document_number).await?;

        let mut tx = self.db.pool().begin().await?;

        let cart = super::cart::lock_open_cart(&mut tx, req.cart_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => {
                    ServiceError::not_found("cart not found or already processed")
                }
                other => other,
            })?;

        let sql = format!(
            "SELECT {ORDER_ITEM_CART_SELECT} FROM pos.cart_items WHERE cart_id = $1 ORDER BY id"
        );
        let cart_items: Vec<CartLine> = sqlx::query_as(&sql)
            .bind(req.cart_id)
            .fetch_all(&mut *tx)
            .await?;
        if cart_items.is_empty() {
            return Err(ServiceError::precondition("cart is empty"));
        }

        let insert_doc_sql = format!(
            "INSERT INTO pos.order_documents \
             (document_number, cashier_id, orders_date, document_type, subtotal, tax_amount, \
              discount_amount, total_amount, paid_amount, change_amount, paid_status, \
              additional_info, notes) \
             VALUES ($1, $2, NOW(), $3, $4, $5, $6, $7, 0, 0, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        );
        let document: OrderDocument = sqlx::query_as(&insert_doc_sql)
            .bind(&document_number)
            .bind(cart.cashier_id)
            .bind(DocumentType::Sale)
            .bind(cart.subtotal)
            .bind(cart.tax_amount)
            .bind(cart.discount_amount)
            .bind(cart.total_amount)
            .bind(PaidStatus::Pending)
            .bind(&req.additional_info)
            .bind(&req.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::already_exists("document number already exists")
                } else {
                    e.into()
                }
            })?;

        for line in &cart_items {
            let (product, group) = load_active_product(&mut tx, line.product_id).await?;
            let commission_amount = commission_for_line(&product, group.as_ref(), line.line_total);
            let price_before_discount = line.unit_price.times(line.quantity);

            sqlx::query(
                "INSERT INTO pos.order_items \
                 (document_id, product_id, serving_employee_id, quantity, unit_price, \
                  price_before_discount, discount_id, discount_amount, line_total, \
                  commission_amount) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(document.id)
            .bind(line.product_id)
            .bind(line.serving_employee_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(price_before_discount)
            .bind(line.discount_id)
            .bind(line.discount_amount)
            .bind(line.line_total)
            .bind(commission_amount)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE pos.carts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(req.cart_id)
            .bind(mercur_core::CartStatus::CheckedOut)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        let order = self.load_order_view(&mut conn, document.id).await?;
        self.publish_order_event(OrderEventType::Created, &order, order.document.cashier_id)
            .await;

        info!(
            order_id = order.document.id,
            cart_id = req.cart_id,
            document_number = %order.document.document_number,
            "order created from cart"
        );

        Ok(order)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_order(&self, id: i64) -> ServiceResult<OrderView> {
        require_id("order_id", id)?;
        let mut conn = self.db.pool().acquire().await?;
        self.load_order_view(&mut conn, id).await
    }

    pub async fn list_orders(&self, req: ListOrdersRequest) -> ServiceResult<ListOrdersResponse> {
        const DEFAULT_PAGE: i32 = 20;

        let (since, until) = match &req.date_range {
            Some(range) => range.open_bounds()?,
            None => (None, None),
        };
        let document_type = req.document_type.map(|d| d.as_i32());
        let paid_status = req.paid_status.map(|p| p.as_i32());

        let condition = "($1::bigint IS NULL OR cashier_id = $1) \
             AND ($2::integer IS NULL OR document_type = $2) \
             AND ($3::integer IS NULL OR paid_status = $3) \
             AND ($4::timestamptz IS NULL OR orders_date >= $4) \
             AND ($5::timestamptz IS NULL OR orders_date < $5)";

        let count_sql = format!("SELECT COUNT(*) FROM pos.order_documents WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.cashier_id)
            .bind(document_type)
            .bind(paid_status)
            .bind(since)
            .bind(until)
            .fetch_one(self.db.pool())
            .await?;

        let ids_sql = format!(
            "SELECT id FROM pos.order_documents WHERE {condition} \
             ORDER BY created_at DESC LIMIT $6 OFFSET $7"
        );
        let order_ids: Vec<i64> = sqlx::query_scalar(&ids_sql)
            .bind(req.cashier_id)
            .bind(document_type)
            .bind(paid_status)
            .bind(since)
            .bind(until)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let mut conn = self.db.pool().acquire().await?;
        let mut order_documents = Vec::with_capacity(order_ids.len());
        for id in order_ids {
            order_documents.push(self.load_order_view(&mut conn, id).await?);
        }

        Ok(ListOrdersResponse {
            order_documents,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Marks an order PAID exactly once. Cash payments (payment type 1)
    /// must tender at least the total and produce change.
    pub async fn process_payment(
        &self,
        req: ProcessPaymentRequest,
    ) -> ServiceResult<ProcessPaymentResponse> {
        require_id("order_id", req.order_id)?;
        require_id("payment_type_id", i64::from(req.payment_type_id))?;
        let paid_amount = Money::parse(&req.paid_amount)
            .map_err(|_| ServiceError::invalid_argument("invalid paid amount format"))?;

        let mut tx = self.db.pool().begin().await?;
        let document = lock_document(&mut tx, req.order_id).await?;

        if is_paid(document.paid_status) {
            return Err(ServiceError::precondition("order already paid"));
        }

        let (paid_amount, change_amount) = if req.payment_type_id == CASH_PAYMENT_TYPE_ID {
            if paid_amount < document.total_amount {
                return Err(ServiceError::precondition("insufficient payment amount"));
            }
            (paid_amount, paid_amount - document.total_amount)
        } else {
            (document.total_amount, Money::ZERO)
        };

        sqlx::query(
            "UPDATE pos.order_documents SET paid_status = $2, payment_type_id = $3, \
             paid_amount = $4, change_amount = $5, updated_at = NOW() WHERE id = $1",
        )
        .bind(document.id)
        .bind(PaidStatus::Paid)
        .bind(req.payment_type_id)
        .bind(paid_amount)
        .bind(change_amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        let order = self.load_order_view(&mut conn, req.order_id).await?;
        self.publish_order_event(
            OrderEventType::PaymentProcessed,
            &order,
            order.document.cashier_id,
        )
        .await;

        info!(
            order_id = req.order_id,
            change = %change_amount,
            "payment processed"
        );

        Ok(ProcessPaymentResponse {
            order_document: order,
            change_amount,
        })
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Nullifies an unpaid order. Paid orders must go through return.
    pub async fn void_order(&self, req: VoidOrderRequest) -> ServiceResult<OrderView> {
        require_id("order_id", req.id)?;
        require_id("voided_by", req.voided_by)?;
        let reason = require_str("reason", &req.reason)?.to_string();

        let mut tx = self.db.pool().begin().await?;
        let document = lock_document(&mut tx, req.id).await?;

        if document.document_type == DocumentType::Void {
            return Err(ServiceError::precondition("order is already voided"));
        }
        if is_paid(document.paid_status) {
            return Err(ServiceError::precondition(
                "cannot void a paid order; use return instead",
            ));
        }

        sqlx::query(
            "UPDATE pos.order_documents SET document_type = $2, notes = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(document.id)
        .bind(DocumentType::Void)
        .bind(&reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        let order = self.load_order_view(&mut conn, req.id).await?;
        self.publish_order_event(OrderEventType::Voided, &order, req.voided_by)
            .await;

        Ok(order)
    }

    // =========================================================================
    // Return
    // =========================================================================

    /// Issues a negative-quantity counter-document (`RET-<original>`) for
    /// the nominated items of a PAID order. When every original item is
    /// returned the original flips to REFUNDED.
    pub async fn return_order(&self, req: ReturnOrderRequest) -> ServiceResult<ReturnOrderResponse> {
        require_id("original_order_id", req.original_order_id)?;
        require_id("processed_by", req.processed_by)?;
        if req.item_ids.is_empty() {
            return Err(ServiceError::invalid_argument(
                "at least one item_id required for return",
            ));
        }

        let mut tx = self.db.pool().begin().await?;
        let original = lock_document(&mut tx, req.original_order_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => ServiceError::not_found("original order not found"),
                other => other,
            })?;

        if !is_paid(original.paid_status) {
            return Err(ServiceError::precondition("can only return paid orders"));
        }
        if original.document_type == DocumentType::Void {
            return Err(ServiceError::precondition("cannot return a voided order"));
        }

        let sql = format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM pos.order_items \
             WHERE id = ANY($1) AND document_id = $2 ORDER BY id"
        );
        let items_to_return: Vec<OrderItem> = sqlx::query_as(&sql)
            .bind(&req.item_ids)
            .bind(req.original_order_id)
            .fetch_all(&mut *tx)
            .await?;

        if items_to_return.is_empty() {
            return Err(ServiceError::precondition("no valid items found for return"));
        }
        if items_to_return.len() != req.item_ids.len() {
            return Err(ServiceError::invalid_argument(
                "some item ids are invalid or do not belong to this order",
            ));
        }

        let lines: Vec<(Money, Money)> = items_to_return
            .iter()
            .map(|item| (item.price_before_discount, item.discount_amount))
            .collect();
        let totals = pricing::totals(&lines, self.tax_rate);

        let return_number = format!("RET-{}", original.document_number);
        let insert_sql = format!(
            "INSERT INTO pos.order_documents \
             (document_number, cashier_id, orders_date, document_type, subtotal, tax_amount, \
              discount_amount, total_amount, paid_amount, change_amount, paid_status, notes) \
             VALUES ($1, $2, NOW(), $3, $4, $5, $6, $7, $7, 0, $8, $9) \
             RETURNING {ORDER_COLUMNS}"
        );
        let return_doc: OrderDocument = sqlx::query_as(&insert_sql)
            .bind(&return_number)
            .bind(req.processed_by)
            .bind(DocumentType::Return)
            .bind(totals.subtotal)
            .bind(totals.tax)
            .bind(totals.discount)
            .bind(totals.total)
            .bind(PaidStatus::Refunded)
            .bind(&req.reason)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::already_exists(format!(
                        "return document {return_number} already exists"
                    ))
                } else {
                    e.into()
                }
            })?;

        for item in &items_to_return {
            sqlx::query(
                "INSERT INTO pos.order_items \
                 (document_id, product_id, serving_employee_id, quantity, unit_price, \
                  price_before_discount, discount_id, discount_amount, line_total, \
                  commission_amount) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(return_doc.id)
            .bind(item.product_id)
            .bind(item.serving_employee_id)
            .bind(-item.quantity)
            .bind(item.unit_price)
            .bind(item.price_before_discount)
            .bind(item.discount_id)
            .bind(item.discount_amount)
            .bind(item.line_total)
            .bind(item.commission_amount)
            .execute(&mut *tx)
            .await?;
        }

        let original_item_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pos.order_items WHERE document_id = $1")
                .bind(req.original_order_id)
                .fetch_one(&mut *tx)
                .await?;
        if items_to_return.len() as i64 == original_item_count {
            sqlx::query(
                "UPDATE pos.order_documents SET paid_status = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(req.original_order_id)
            .bind(PaidStatus::Refunded)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut conn = self.db.pool().acquire().await?;
        let return_document = self.load_order_view(&mut conn, return_doc.id).await?;
        self.publish_order_event(OrderEventType::Returned, &return_document, req.processed_by)
            .await;

        info!(
            original_order_id = req.original_order_id,
            return_document = %return_number,
            refund = %totals.total,
            "return processed"
        );

        Ok(ReturnOrderResponse { return_document })
    }

    /// Upfront duplicate check; the unique index remains the backstop
    /// under concurrent creation.
    async fn ensure_document_number_free(&self, document_number: &str) -> ServiceResult<()> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM pos.order_documents WHERE document_number = $1")
                .bind(document_number)
                .fetch_optional(self.db.pool())
                .await?;
        if existing.is_some() {
            return Err(ServiceError::already_exists("document number already exists"));
        }
        Ok(())
    }
}

/// Cart item columns needed to copy a line into an order.
const ORDER_ITEM_CART_SELECT: &str =
    "product_id, serving_employee_id, quantity, unit_price, discount_id, discount_amount, \
     line_total";

#[derive(sqlx::FromRow)]
struct CartLine {
    product_id: i32,
    serving_employee_id: Option<i64>,
    quantity: i32,
    unit_price: Money,
    discount_id: Option<i32>,
    discount_amount: Money,
    line_total: Money,
}

/// Locks an order document row for a state transition.
async fn lock_document(conn: &mut PgConnection, order_id: i64) -> ServiceResult<OrderDocument> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM pos.order_documents WHERE id = $1 FOR UPDATE");
    sqlx::query_as(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("order not found"))
}

async fn insert_document(
    conn: &mut PgConnection,
    document_number: &str,
    req: &CreateOrderRequest,
) -> ServiceResult<OrderDocument> {
    let sql = format!(
        "INSERT INTO pos.order_documents \
         (document_number, cashier_id, orders_date, document_type, subtotal, tax_amount, \
          discount_amount, total_amount, paid_amount, change_amount, paid_status, \
          additional_info, notes) \
         VALUES ($1, $2, NOW(), $3, 0, 0, 0, 0, 0, 0, $4, $5, $6) RETURNING {ORDER_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(document_number)
        .bind(req.cashier_id)
        .bind(req.document_type)
        .bind(PaidStatus::Pending)
        .bind(&req.additional_info)
        .bind(&req.notes)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::already_exists("document number already exists")
            } else {
                e.into()
            }
        })
}

async fn update_document_totals(
    conn: &mut PgConnection,
    document_id: i64,
    totals: &pricing::Totals,
) -> ServiceResult<()> {
    sqlx::query(
        "UPDATE pos.order_documents SET subtotal = $2, tax_amount = $3, discount_amount = $4, \
         total_amount = $5, updated_at = NOW() WHERE id = $1",
    )
    .bind(document_id)
    .bind(totals.subtotal)
    .bind(totals.tax)
    .bind(totals.discount)
    .bind(totals.total)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Loads an active product and its group.
async fn load_active_product(
    conn: &mut PgConnection,
    product_id: i32,
) -> ServiceResult<(PosProduct, Option<ProductGroup>)> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM pos.products WHERE id = $1 AND is_active = TRUE");
    let product: PosProduct = sqlx::query_as(&sql)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("product {product_id} not found or inactive"))
        })?;

    let group = match product.product_group_id {
        Some(group_id) => {
            let sql = format!("SELECT {GROUP_COLUMNS} FROM pos.product_groups WHERE id = $1");
            sqlx::query_as::<_, ProductGroup>(&sql)
                .bind(group_id)
                .fetch_optional(&mut *conn)
                .await?
        }
        None => None,
    };

    Ok((product, group))
}

/// Validates a per-line discount against scope and minimum quantity, then
/// computes its amount.
async fn validate_item_discount(
    conn: &mut PgConnection,
    discount_id: i32,
    product: &PosProduct,
    quantity: i32,
) -> ServiceResult<Money> {
    let sql = format!(
        "SELECT {DISCOUNT_COLUMNS} FROM pos.discounts WHERE id = $1 AND is_active = TRUE"
    );
    let discount: Discount = sqlx::query_as(&sql)
        .bind(discount_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!("discount {discount_id} not found or inactive"))
        })?;

    if !discount.window_contains(Utc::now()) {
        return Err(ServiceError::precondition(format!(
            "discount {discount_id} is outside its validity window"
        )));
    }
    if let Some(scope_product) = discount.product_id {
        if scope_product != product.id {
            return Err(ServiceError::precondition(format!(
                "discount {discount_id} does not apply to product {}",
                product.id
            )));
        }
    }
    if let Some(scope_group) = discount.product_group_id {
        if product.product_group_id != Some(scope_group) {
            return Err(ServiceError::precondition(format!(
                "discount {discount_id} does not apply to product group of product {}",
                product.id
            )));
        }
    }
    if quantity < discount.min_quantity {
        return Err(ServiceError::precondition(format!(
            "discount requires minimum quantity of {}",
            discount.min_quantity
        )));
    }

    Ok(pricing::discount_amount(
        discount.discount_type,
        discount.discount_value,
        product.product_price,
        quantity,
        discount.min_quantity,
    ))
}

/// Commission for a line: `line_total × group.commission_rate / 100` when
/// the product is commission-eligible and grouped, else zero.
fn commission_for_line(
    product: &PosProduct,
    group: Option<&ProductGroup>,
    line_total: Money,
) -> Money {
    match group {
        Some(group) if product.commission_eligible => group.commission_rate.percent_of(line_total),
        _ => Money::ZERO,
    }
}
