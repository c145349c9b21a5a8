//! Stock ledger operations.
//!
//! Every mutating call follows the same shape: validate, begin a
//! transaction, lock the balance row with `FOR UPDATE`, check the
//! precondition against the pre-image, apply the delta, append the journal
//! row(s), commit. An early return drops the transaction and rolls back, so
//! partial writes are impossible.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::Money;
use mercur_core::pagination::Pagination;
use mercur_core::types::{MovementType, ReferenceType};
use mercur_core::validation::{require_id, require_positive};

use super::messages::*;
use super::model::{Stock, StockMovement};
use super::InventoryService;

/// Engine default used when a product has no `reorder_level`.
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 10;

pub(crate) const STOCK_COLUMNS: &str = "id, product_id, warehouse_id, available_quantity, \
     reserved_quantity, unit_cost, last_restock_date, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, warehouse_id, movement_type, quantity, \
     unit_cost, reference_type, reference_id, notes, created_by, created_at";

const STOCK_VIEW_SELECT: &str = "SELECT s.id, s.product_id, s.warehouse_id, \
     s.available_quantity, s.reserved_quantity, s.unit_cost, s.last_restock_date, \
     w.warehouse_name, p.product_name, NULL::integer AS reorder_level, s.updated_at \
     FROM inventory.stocks s \
     LEFT JOIN inventory.warehouses w ON w.id = s.warehouse_id \
     LEFT JOIN inventory.products p ON p.id = s.product_id";

struct NewMovement<'a> {
    product_id: i32,
    warehouse_id: i32,
    movement_type: MovementType,
    /// Signed journal quantity.
    quantity: i32,
    unit_cost: Option<Money>,
    reference_type: ReferenceType,
    reference_id: Option<&'a str>,
    notes: Option<&'a str>,
    created_by: i64,
}

impl InventoryService {
    // =========================================================================
    // Queries
    // =========================================================================

    /// Availability of a product, optionally narrowed to one warehouse.
    pub async fn check_stock(&self, req: CheckStockRequest) -> ServiceResult<CheckStockResponse> {
        require_id("product_id", i64::from(req.product_id))?;

        let stock_details = self.stock_views(req.product_id, req.warehouse_id).await?;
        let total_available_quantity = stock_details
            .iter()
            .map(|s| s.available_quantity)
            .sum::<i32>();

        Ok(CheckStockResponse {
            is_available: total_available_quantity > 0,
            total_available_quantity,
            stock_details,
        })
    }

    pub async fn get_stock(&self, req: GetStockRequest) -> ServiceResult<GetStockResponse> {
        require_id("product_id", i64::from(req.product_id))?;
        let stocks = self.stock_views(req.product_id, req.warehouse_id).await?;
        Ok(GetStockResponse { stocks })
    }

    async fn stock_views(
        &self,
        product_id: i32,
        warehouse_id: Option<i32>,
    ) -> ServiceResult<Vec<StockView>> {
        let sql = format!(
            "{STOCK_VIEW_SELECT} \
             WHERE s.product_id = $1 AND ($2::integer IS NULL OR s.warehouse_id = $2) \
             ORDER BY s.warehouse_id"
        );
        Ok(sqlx::query_as(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .fetch_all(self.db.pool())
            .await?)
    }

    /// Stock rows at or below their product's reorder level (engine default
    /// 10 when the level is unset).
    pub async fn list_low_stock(
        &self,
        req: ListLowStockRequest,
    ) -> ServiceResult<ListLowStockResponse> {
        const DEFAULT_PAGE: i32 = 50;

        let condition = "s.available_quantity <= \
             CASE WHEN p.reorder_level > 0 THEN p.reorder_level ELSE $2 END \
             AND ($1::integer IS NULL OR s.warehouse_id = $1)";

        let count_sql = format!(
            "SELECT COUNT(*) FROM inventory.stocks s \
             JOIN inventory.products p ON p.id = s.product_id WHERE {condition}"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.warehouse_id)
            .bind(DEFAULT_LOW_STOCK_THRESHOLD)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT s.id, s.product_id, s.warehouse_id, s.available_quantity, \
             s.reserved_quantity, s.unit_cost, s.last_restock_date, w.warehouse_name, \
             p.product_name, \
             CASE WHEN p.reorder_level > 0 THEN p.reorder_level ELSE $2 END AS reorder_level, \
             s.updated_at \
             FROM inventory.stocks s \
             JOIN inventory.products p ON p.id = s.product_id \
             LEFT JOIN inventory.warehouses w ON w.id = s.warehouse_id \
             WHERE {condition} \
             ORDER BY s.available_quantity ASC, s.id \
             LIMIT $3 OFFSET $4"
        );
        let low_stocks: Vec<StockView> = sqlx::query_as(&rows_sql)
            .bind(req.warehouse_id)
            .bind(DEFAULT_LOW_STOCK_THRESHOLD)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListLowStockResponse {
            low_stocks,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    pub async fn list_stock_movements(
        &self,
        req: ListStockMovementsRequest,
    ) -> ServiceResult<ListStockMovementsResponse> {
        const DEFAULT_PAGE: i32 = 50;

        let (since, until) = match &req.date_range {
            Some(range) => range.open_bounds()?,
            None => (None, None),
        };
        let movement_type = req.movement_type.map(|m| m.as_i32());

        let condition = "($1::integer IS NULL OR product_id = $1) \
             AND ($2::integer IS NULL OR warehouse_id = $2) \
             AND ($3::integer IS NULL OR movement_type = $3) \
             AND ($4::timestamptz IS NULL OR created_at >= $4) \
             AND ($5::timestamptz IS NULL OR created_at < $5)";

        let count_sql =
            format!("SELECT COUNT(*) FROM inventory.stock_movements WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.product_id)
            .bind(req.warehouse_id)
            .bind(movement_type)
            .bind(since)
            .bind(until)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory.stock_movements WHERE {condition} \
             ORDER BY created_at DESC LIMIT $6 OFFSET $7"
        );
        let stock_movements: Vec<StockMovement> = sqlx::query_as(&rows_sql)
            .bind(req.product_id)
            .bind(req.warehouse_id)
            .bind(movement_type)
            .bind(since)
            .bind(until)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListStockMovementsResponse {
            stock_movements,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Moves quantity from `available` to `reserved` and journals an
    /// ADJUSTMENT entry with positive quantity.
    pub async fn reserve_stock(
        &self,
        req: ReserveStockRequest,
    ) -> ServiceResult<StockMutationResponse> {
        require_id("product_id", i64::from(req.product_id))?;
        require_id("warehouse_id", i64::from(req.warehouse_id))?;
        require_positive("quantity", req.quantity)?;

        let mut tx = self.db.pool().begin().await?;

        let stock = lock_stock(&mut tx, req.product_id, req.warehouse_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("stock not found for this product and warehouse")
            })?;

        if stock.available_quantity < req.quantity {
            return Err(ServiceError::precondition(format!(
                "insufficient stock: available {}, requested {}",
                stock.available_quantity, req.quantity
            )));
        }

        let sql = format!(
            "UPDATE inventory.stocks SET available_quantity = available_quantity - $2, \
             reserved_quantity = reserved_quantity + $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {STOCK_COLUMNS}"
        );
        let updated_stock: Stock = sqlx::query_as(&sql)
            .bind(stock.id)
            .bind(req.quantity)
            .fetch_one(&mut *tx)
            .await?;

        let stock_movement = insert_movement(
            &mut tx,
            NewMovement {
                product_id: req.product_id,
                warehouse_id: req.warehouse_id,
                movement_type: MovementType::Adjustment,
                quantity: req.quantity,
                unit_cost: None,
                reference_type: ReferenceType::Adjustment,
                reference_id: req.reference_id.as_deref(),
                notes: None,
                created_by: req.reserved_by,
            },
        )
        .await?;

        tx.commit().await?;
        self.invalidate_inventory_caches(&[req.product_id]).await;

        info!(
            product_id = req.product_id,
            warehouse_id = req.warehouse_id,
            quantity = req.quantity,
            "stock reserved"
        );

        Ok(StockMutationResponse {
            updated_stock,
            stock_movement,
        })
    }

    /// Inverts a reservation; the journal entry carries negative quantity so
    /// reserve-then-release nets to zero.
    pub async fn release_stock(
        &self,
        req: ReleaseStockRequest,
    ) -> ServiceResult<StockMutationResponse> {
        require_id("product_id", i64::from(req.product_id))?;
        require_id("warehouse_id", i64::from(req.warehouse_id))?;
        require_positive("quantity", req.quantity)?;

        let mut tx = self.db.pool().begin().await?;

        let stock = lock_stock(&mut tx, req.product_id, req.warehouse_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("stock not found for this product and warehouse")
            })?;

        if stock.reserved_quantity < req.quantity {
            return Err(ServiceError::precondition(format!(
                "insufficient reserved stock: reserved {}, requested {}",
                stock.reserved_quantity, req.quantity
            )));
        }

        let sql = format!(
            "UPDATE inventory.stocks SET reserved_quantity = reserved_quantity - $2, \
             available_quantity = available_quantity + $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {STOCK_COLUMNS}"
        );
        let updated_stock: Stock = sqlx::query_as(&sql)
            .bind(stock.id)
            .bind(req.quantity)
            .fetch_one(&mut *tx)
            .await?;

        let stock_movement = insert_movement(
            &mut tx,
            NewMovement {
                product_id: req.product_id,
                warehouse_id: req.warehouse_id,
                movement_type: MovementType::Adjustment,
                quantity: -req.quantity,
                unit_cost: None,
                reference_type: ReferenceType::Adjustment,
                reference_id: req.reference_id.as_deref(),
                notes: None,
                created_by: req.released_by,
            },
        )
        .await?;

        tx.commit().await?;
        self.invalidate_inventory_caches(&[req.product_id]).await;

        Ok(StockMutationResponse {
            updated_stock,
            stock_movement,
        })
    }

    /// Applies an IN, OUT or ADJUSTMENT delta, creating the balance row on
    /// first write.
    pub async fn update_stock(
        &self,
        req: UpdateStockRequest,
    ) -> ServiceResult<StockMutationResponse> {
        require_id("product_id", i64::from(req.product_id))?;
        require_id("warehouse_id", i64::from(req.warehouse_id))?;

        match req.movement_type {
            MovementType::In | MovementType::Out => require_positive("quantity", req.quantity)?,
            MovementType::Adjustment => {
                if req.quantity == 0 {
                    return Err(ServiceError::invalid_argument("quantity must not be 0"));
                }
            }
            MovementType::Transfer => {
                return Err(ServiceError::invalid_argument(
                    "use TransferStock for transfers",
                ));
            }
        }

        let unit_cost = match &req.unit_cost {
            Some(raw) => Some(
                Money::parse(raw)
                    .map_err(|_| ServiceError::invalid_argument("unit_cost must be a decimal"))?,
            ),
            None => None,
        };

        let mut tx = self.db.pool().begin().await?;

        let stock = match lock_stock(&mut tx, req.product_id, req.warehouse_id).await? {
            Some(stock) => stock,
            // Upsert-on-first-write: the first IN creates the row.
            None => {
                let sql = format!(
                    "INSERT INTO inventory.stocks \
                     (product_id, warehouse_id, available_quantity, reserved_quantity, unit_cost) \
                     VALUES ($1, $2, 0, 0, $3) RETURNING {STOCK_COLUMNS}"
                );
                sqlx::query_as(&sql)
                    .bind(req.product_id)
                    .bind(req.warehouse_id)
                    .bind(unit_cost.unwrap_or_default())
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        let (new_available, journal_quantity) = match req.movement_type {
            MovementType::In => (stock.available_quantity + req.quantity, req.quantity),
            MovementType::Out => {
                if stock.available_quantity < req.quantity {
                    return Err(ServiceError::precondition(format!(
                        "insufficient stock: available {}, requested {}",
                        stock.available_quantity, req.quantity
                    )));
                }
                (stock.available_quantity - req.quantity, -req.quantity)
            }
            MovementType::Adjustment => {
                let next = stock.available_quantity + req.quantity;
                if next < 0 {
                    return Err(ServiceError::precondition(
                        "adjustment would result in negative stock",
                    ));
                }
                (next, req.quantity)
            }
            MovementType::Transfer => unreachable!("rejected above"),
        };

        let new_cost = match (req.movement_type, unit_cost) {
            (MovementType::In, Some(cost)) => cost,
            _ => stock.unit_cost,
        };
        let restock_date = if req.movement_type == MovementType::In {
            Some(Utc::now().date_naive())
        } else {
            stock.last_restock_date
        };

        let sql = format!(
            "UPDATE inventory.stocks SET available_quantity = $2, unit_cost = $3, \
             last_restock_date = $4, updated_at = NOW() WHERE id = $1 RETURNING {STOCK_COLUMNS}"
        );
        let updated_stock: Stock = sqlx::query_as(&sql)
            .bind(stock.id)
            .bind(new_available)
            .bind(new_cost)
            .bind(restock_date)
            .fetch_one(&mut *tx)
            .await?;

        let stock_movement = insert_movement(
            &mut tx,
            NewMovement {
                product_id: req.product_id,
                warehouse_id: req.warehouse_id,
                movement_type: req.movement_type,
                quantity: journal_quantity,
                unit_cost,
                reference_type: req.reference_type,
                reference_id: req.reference_id.as_deref(),
                notes: req.notes.as_deref(),
                created_by: req.created_by,
            },
        )
        .await?;

        tx.commit().await?;
        self.invalidate_inventory_caches(&[req.product_id]).await;

        Ok(StockMutationResponse {
            updated_stock,
            stock_movement,
        })
    }

    /// Atomically moves quantity between warehouses, writing two symmetric
    /// TRANSFER journal rows that share one reference id.
    pub async fn transfer_stock(
        &self,
        req: TransferStockRequest,
    ) -> ServiceResult<TransferStockResponse> {
        require_id("product_id", i64::from(req.product_id))?;
        require_id("from_warehouse_id", i64::from(req.from_warehouse_id))?;
        require_id("to_warehouse_id", i64::from(req.to_warehouse_id))?;
        require_positive("quantity", req.quantity)?;
        if req.from_warehouse_id == req.to_warehouse_id {
            return Err(ServiceError::invalid_argument(
                "cannot transfer to the same warehouse",
            ));
        }

        let mut tx = self.db.pool().begin().await?;

        let from_stock = lock_stock(&mut tx, req.product_id, req.from_warehouse_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("source stock not found"))?;

        if from_stock.available_quantity < req.quantity {
            return Err(ServiceError::precondition(format!(
                "insufficient stock in source warehouse: available {}, requested {}",
                from_stock.available_quantity, req.quantity
            )));
        }

        // Destination row is created on demand, cost copied from source.
        let to_stock = match lock_stock(&mut tx, req.product_id, req.to_warehouse_id).await? {
            Some(stock) => stock,
            None => {
                let sql = format!(
                    "INSERT INTO inventory.stocks \
                     (product_id, warehouse_id, available_quantity, reserved_quantity, unit_cost) \
                     VALUES ($1, $2, 0, 0, $3) RETURNING {STOCK_COLUMNS}"
                );
                sqlx::query_as(&sql)
                    .bind(req.product_id)
                    .bind(req.to_warehouse_id)
                    .bind(from_stock.unit_cost)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        let sql = format!(
            "UPDATE inventory.stocks SET available_quantity = available_quantity - $2, \
             updated_at = NOW() WHERE id = $1 RETURNING {STOCK_COLUMNS}"
        );
        let source_stock: Stock = sqlx::query_as(&sql)
            .bind(from_stock.id)
            .bind(req.quantity)
            .fetch_one(&mut *tx)
            .await?;

        let sql = format!(
            "UPDATE inventory.stocks SET available_quantity = available_quantity + $2, \
             updated_at = NOW() WHERE id = $1 RETURNING {STOCK_COLUMNS}"
        );
        let destination_stock: Stock = sqlx::query_as(&sql)
            .bind(to_stock.id)
            .bind(req.quantity)
            .fetch_one(&mut *tx)
            .await?;

        let reference_id = format!(
            "TRANSFER_{}_{}_{}",
            req.product_id,
            req.from_warehouse_id,
            Utc::now().timestamp()
        );

        let out_movement = insert_movement(
            &mut tx,
            NewMovement {
                product_id: req.product_id,
                warehouse_id: req.from_warehouse_id,
                movement_type: MovementType::Transfer,
                quantity: -req.quantity,
                unit_cost: None,
                reference_type: ReferenceType::Transfer,
                reference_id: Some(&reference_id),
                notes: req.notes.as_deref(),
                created_by: req.transferred_by,
            },
        )
        .await?;

        let in_movement = insert_movement(
            &mut tx,
            NewMovement {
                product_id: req.product_id,
                warehouse_id: req.to_warehouse_id,
                movement_type: MovementType::Transfer,
                quantity: req.quantity,
                unit_cost: None,
                reference_type: ReferenceType::Transfer,
                reference_id: Some(&reference_id),
                notes: req.notes.as_deref(),
                created_by: req.transferred_by,
            },
        )
        .await?;

        tx.commit().await?;
        self.invalidate_inventory_caches(&[req.product_id]).await;

        info!(
            product_id = req.product_id,
            from = req.from_warehouse_id,
            to = req.to_warehouse_id,
            quantity = req.quantity,
            reference_id = %reference_id,
            "stock transferred"
        );

        Ok(TransferStockResponse {
            stock_movements: vec![out_movement, in_movement],
            source_stock,
            destination_stock,
        })
    }
}

/// Reads a stock row with a write-intent lock.
async fn lock_stock(
    conn: &mut PgConnection,
    product_id: i32,
    warehouse_id: i32,
) -> ServiceResult<Option<Stock>> {
    let sql = format!(
        "SELECT {STOCK_COLUMNS} FROM inventory.stocks \
         WHERE product_id = $1 AND warehouse_id = $2 FOR UPDATE"
    );
    Ok(sqlx::query_as(&sql)
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *conn)
        .await?)
}

async fn insert_movement(
    conn: &mut PgConnection,
    movement: NewMovement<'_>,
) -> ServiceResult<StockMovement> {
    let sql = format!(
        "INSERT INTO inventory.stock_movements \
         (product_id, warehouse_id, movement_type, quantity, unit_cost, reference_type, \
          reference_id, notes, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {MOVEMENT_COLUMNS}"
    );
    Ok(sqlx::query_as(&sql)
        .bind(movement.product_id)
        .bind(movement.warehouse_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.unit_cost)
        .bind(movement.reference_type)
        .bind(movement.reference_id)
        .bind(movement.notes)
        .bind(movement.created_by)
        .fetch_one(&mut *conn)
        .await?)
}
