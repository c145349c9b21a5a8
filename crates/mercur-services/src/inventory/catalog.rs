//! Inventory master data: products, warehouses, suppliers, product types.

use std::collections::HashMap;

use mercur_cache::cache;
use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::pagination::Pagination;
use mercur_core::validation::{require_id, require_str};

use super::messages::*;
use super::model::{InventoryProduct, ProductType, Stock, Supplier, Warehouse};
use super::stock::STOCK_COLUMNS;
use super::InventoryService;

const PRODUCT_COLUMNS: &str = "id, product_code, product_name, product_type_id, supplier_id, \
     unit_of_measure, reorder_level, max_stock_level, is_active, created_at, updated_at";

const WAREHOUSE_COLUMNS: &str =
    "id, warehouse_code, warehouse_name, location, manager_id, is_active, created_at, updated_at";

const SUPPLIER_COLUMNS: &str = "id, supplier_code, supplier_name, contact_person, phone, email, \
     address, is_active, created_at, updated_at";

const PRODUCT_TYPE_COLUMNS: &str =
    "id, product_type_name, description, created_at, updated_at";

impl InventoryService {
    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(&self, req: CreateProductRequest) -> ServiceResult<ProductView> {
        let product_code = require_str("product_code", &req.product_code)?.to_string();
        let product_name = require_str("product_name", &req.product_name)?.to_string();

        let sql = format!(
            "INSERT INTO inventory.products \
             (product_code, product_name, product_type_id, supplier_id, unit_of_measure, \
              reorder_level, max_stock_level, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE) RETURNING {PRODUCT_COLUMNS}"
        );
        let product: InventoryProduct = sqlx::query_as(&sql)
            .bind(&product_code)
            .bind(&product_name)
            .bind(req.product_type_id)
            .bind(req.supplier_id)
            .bind(&req.unit_of_measure)
            .bind(req.reorder_level)
            .bind(req.max_stock_level)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| {
                if mercur_core::is_unique_violation(&e) {
                    ServiceError::already_exists(format!("product code {product_code}"))
                } else {
                    e.into()
                }
            })?;

        self.cache
            .invalidate(&[cache::INVENTORY_PRODUCTS_KEY.to_string()])
            .await;
        self.assemble_product_view(product).await
    }

    pub async fn update_product(&self, req: UpdateProductRequest) -> ServiceResult<ProductView> {
        require_id("id", i64::from(req.id))?;
        let current = self.fetch_product(req.id).await?;

        let sql = format!(
            "UPDATE inventory.products SET product_name = $2, product_type_id = $3, \
             supplier_id = $4, unit_of_measure = $5, reorder_level = $6, max_stock_level = $7, \
             is_active = $8, updated_at = NOW() WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let product: InventoryProduct = sqlx::query_as(&sql)
            .bind(req.id)
            .bind(req.product_name.unwrap_or(current.product_name))
            .bind(req.product_type_id.unwrap_or(current.product_type_id))
            .bind(req.supplier_id.unwrap_or(current.supplier_id))
            .bind(req.unit_of_measure.unwrap_or(current.unit_of_measure))
            .bind(req.reorder_level.unwrap_or(current.reorder_level))
            .bind(req.max_stock_level.unwrap_or(current.max_stock_level))
            .bind(req.is_active.unwrap_or(current.is_active))
            .fetch_one(self.db.pool())
            .await?;

        self.invalidate_inventory_caches(&[req.id]).await;
        self.assemble_product_view(product).await
    }

    pub async fn get_product(&self, id: i32) -> ServiceResult<ProductView> {
        require_id("id", i64::from(id))?;
        let product = self.fetch_product(id).await?;
        self.assemble_product_view(product).await
    }

    pub async fn get_product_by_code(&self, product_code: &str) -> ServiceResult<ProductView> {
        let code = require_str("product_code", product_code)?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM inventory.products WHERE product_code = $1");
        let product: InventoryProduct = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("product not found"))?;
        self.assemble_product_view(product).await
    }

    /// Lists products; all filters compose with AND.
    pub async fn list_products(
        &self,
        req: ListProductsRequest,
    ) -> ServiceResult<ListProductsResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let search = req
            .search_term
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let condition = "($1::boolean IS NULL OR is_active = $1) \
             AND ($2::integer IS NULL OR product_type_id = $2) \
             AND ($3::integer IS NULL OR supplier_id = $3) \
             AND ($4::text IS NULL OR product_code ILIKE $4 OR product_name ILIKE $4 \
                  OR unit_of_measure ILIKE $4)";

        let count_sql = format!("SELECT COUNT(*) FROM inventory.products WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.is_active)
            .bind(req.product_type_id)
            .bind(req.supplier_id)
            .bind(&search)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM inventory.products WHERE {condition} \
             ORDER BY id LIMIT $5 OFFSET $6"
        );
        let products: Vec<InventoryProduct> = sqlx::query_as(&rows_sql)
            .bind(req.is_active)
            .bind(req.product_type_id)
            .bind(req.supplier_id)
            .bind(&search)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let products = self.assemble_product_views(products).await?;

        Ok(ListProductsResponse {
            products,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    async fn fetch_product(&self, id: i32) -> ServiceResult<InventoryProduct> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM inventory.products WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("product not found"))
    }

    async fn assemble_product_view(&self, product: InventoryProduct) -> ServiceResult<ProductView> {
        let mut views = self.assemble_product_views(vec![product]).await?;
        Ok(views.remove(0))
    }

    /// Eager-loads product type, supplier and stock rows for a page of
    /// products.
    async fn assemble_product_views(
        &self,
        products: Vec<InventoryProduct>,
    ) -> ServiceResult<Vec<ProductView>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let type_ids: Vec<i32> = products.iter().map(|p| p.product_type_id).collect();
        let supplier_ids: Vec<i32> = products.iter().map(|p| p.supplier_id).collect();
        let product_ids: Vec<i32> = products.iter().map(|p| p.id).collect();

        let sql = format!(
            "SELECT {PRODUCT_TYPE_COLUMNS} FROM inventory.product_types WHERE id = ANY($1)"
        );
        let types: Vec<ProductType> = sqlx::query_as(&sql)
            .bind(&type_ids)
            .fetch_all(self.db.pool())
            .await?;
        let types: HashMap<i32, ProductType> = types.into_iter().map(|t| (t.id, t)).collect();

        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM inventory.suppliers WHERE id = ANY($1)");
        let suppliers: Vec<Supplier> = sqlx::query_as(&sql)
            .bind(&supplier_ids)
            .fetch_all(self.db.pool())
            .await?;
        let suppliers: HashMap<i32, Supplier> =
            suppliers.into_iter().map(|s| (s.id, s)).collect();

        let sql = format!(
            "SELECT {STOCK_COLUMNS} FROM inventory.stocks WHERE product_id = ANY($1) \
             ORDER BY warehouse_id"
        );
        let stocks: Vec<Stock> = sqlx::query_as(&sql)
            .bind(&product_ids)
            .fetch_all(self.db.pool())
            .await?;
        let mut stocks_by_product: HashMap<i32, Vec<Stock>> = HashMap::new();
        for stock in stocks {
            stocks_by_product
                .entry(stock.product_id)
                .or_default()
                .push(stock);
        }

        Ok(products
            .into_iter()
            .map(|p| {
                let product_type = types.get(&p.product_type_id).cloned();
                let supplier = suppliers.get(&p.supplier_id).cloned();
                let stocks = stocks_by_product.remove(&p.id).unwrap_or_default();
                ProductView {
                    product: p,
                    product_type,
                    supplier,
                    stocks,
                }
            })
            .collect())
    }

    // =========================================================================
    // Warehouses
    // =========================================================================

    pub async fn create_warehouse(&self, req: CreateWarehouseRequest) -> ServiceResult<Warehouse> {
        let warehouse_code = require_str("warehouse_code", &req.warehouse_code)?.to_string();
        let warehouse_name = require_str("warehouse_name", &req.warehouse_name)?.to_string();

        let sql = format!(
            "INSERT INTO inventory.warehouses (warehouse_code, warehouse_name, location, \
             manager_id, is_active) VALUES ($1, $2, $3, $4, TRUE) RETURNING {WAREHOUSE_COLUMNS}"
        );
        let warehouse: Warehouse = sqlx::query_as(&sql)
            .bind(&warehouse_code)
            .bind(&warehouse_name)
            .bind(req.location)
            .bind(req.manager_id)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| {
                if mercur_core::is_unique_violation(&e) {
                    ServiceError::already_exists(format!("warehouse code {warehouse_code}"))
                } else {
                    e.into()
                }
            })?;

        self.cache
            .invalidate(&[cache::INVENTORY_WAREHOUSES_KEY.to_string()])
            .await;
        Ok(warehouse)
    }

    pub async fn get_warehouse(&self, warehouse_code: &str) -> ServiceResult<Warehouse> {
        let code = require_str("warehouse_code", warehouse_code)?;
        let sql =
            format!("SELECT {WAREHOUSE_COLUMNS} FROM inventory.warehouses WHERE warehouse_code = $1");
        sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("warehouse not found"))
    }

    pub async fn list_warehouses(
        &self,
        req: ListWarehousesRequest,
    ) -> ServiceResult<ListWarehousesResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let search = req
            .search_term
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let condition = "($1::boolean IS NULL OR is_active = $1) \
             AND ($2::text IS NULL OR warehouse_code = $2) \
             AND ($3::text IS NULL OR warehouse_name = $3) \
             AND ($4::text IS NULL OR warehouse_code ILIKE $4 OR warehouse_name ILIKE $4)";

        let count_sql = format!("SELECT COUNT(*) FROM inventory.warehouses WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.is_active)
            .bind(&req.warehouse_code)
            .bind(&req.warehouse_name)
            .bind(&search)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM inventory.warehouses WHERE {condition} \
             ORDER BY id LIMIT $5 OFFSET $6"
        );
        let warehouses: Vec<Warehouse> = sqlx::query_as(&rows_sql)
            .bind(req.is_active)
            .bind(&req.warehouse_code)
            .bind(&req.warehouse_name)
            .bind(&search)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListWarehousesResponse {
            warehouses,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Suppliers
    // =========================================================================

    pub async fn create_supplier(&self, req: CreateSupplierRequest) -> ServiceResult<Supplier> {
        let supplier_code = require_str("supplier_code", &req.supplier_code)?.to_string();
        let supplier_name = require_str("supplier_name", &req.supplier_name)?.to_string();

        let sql = format!(
            "INSERT INTO inventory.suppliers (supplier_code, supplier_name, contact_person, \
             phone, email, address, is_active) VALUES ($1, $2, $3, $4, $5, $6, TRUE) \
             RETURNING {SUPPLIER_COLUMNS}"
        );
        let supplier: Supplier = sqlx::query_as(&sql)
            .bind(&supplier_code)
            .bind(&supplier_name)
            .bind(req.contact_person)
            .bind(req.phone)
            .bind(req.email)
            .bind(req.address)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| {
                if mercur_core::is_unique_violation(&e) {
                    ServiceError::already_exists(format!("supplier code {supplier_code}"))
                } else {
                    e.into()
                }
            })?;

        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: i32) -> ServiceResult<Supplier> {
        require_id("id", i64::from(id))?;
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM inventory.suppliers WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("supplier not found"))
    }

    pub async fn list_suppliers(
        &self,
        req: ListSuppliersRequest,
    ) -> ServiceResult<ListSuppliersResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let search = req
            .search_term
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let condition = "($1::boolean IS NULL OR is_active = $1) \
             AND ($2::text IS NULL OR supplier_code = $2) \
             AND ($3::text IS NULL OR supplier_name = $3) \
             AND ($4::text IS NULL OR supplier_code ILIKE $4 OR supplier_name ILIKE $4 \
                  OR contact_person ILIKE $4 OR phone ILIKE $4 OR email ILIKE $4 \
                  OR address ILIKE $4)";

        let count_sql = format!("SELECT COUNT(*) FROM inventory.suppliers WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.is_active)
            .bind(&req.supplier_code)
            .bind(&req.supplier_name)
            .bind(&search)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {SUPPLIER_COLUMNS} FROM inventory.suppliers WHERE {condition} \
             ORDER BY id LIMIT $5 OFFSET $6"
        );
        let suppliers: Vec<Supplier> = sqlx::query_as(&rows_sql)
            .bind(req.is_active)
            .bind(&req.supplier_code)
            .bind(&req.supplier_name)
            .bind(&search)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListSuppliersResponse {
            suppliers,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Product types
    // =========================================================================

    pub async fn create_product_type(
        &self,
        req: CreateProductTypeRequest,
    ) -> ServiceResult<ProductType> {
        let product_type_name = require_str("product_type_name", &req.product_type_name)?;

        let sql = format!(
            "INSERT INTO inventory.product_types (product_type_name, description) \
             VALUES ($1, $2) RETURNING {PRODUCT_TYPE_COLUMNS}"
        );
        let product_type: ProductType = sqlx::query_as(&sql)
            .bind(product_type_name)
            .bind(req.description)
            .fetch_one(self.db.pool())
            .await?;

        self.cache
            .invalidate(&[cache::INVENTORY_PRODUCT_TYPES_KEY.to_string()])
            .await;
        Ok(product_type)
    }

    pub async fn list_product_types(
        &self,
        req: ListProductTypesRequest,
    ) -> ServiceResult<ListProductTypesResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let search = req
            .search_term
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let condition = "($1::text IS NULL OR product_type_name ILIKE $1)";

        let count_sql = format!("SELECT COUNT(*) FROM inventory.product_types WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {PRODUCT_TYPE_COLUMNS} FROM inventory.product_types WHERE {condition} \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let product_types: Vec<ProductType> = sqlx::query_as(&rows_sql)
            .bind(&search)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListProductTypesResponse {
            product_types,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }
}
