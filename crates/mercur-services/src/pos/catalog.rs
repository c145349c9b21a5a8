//! POS catalog: products, product groups, payment types, discounts.

use std::collections::HashMap;

use chrono::Utc;

use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::Money;
use mercur_core::pagination::Pagination;
use mercur_core::validation::{require_id, require_str};

use super::messages::*;
use super::model::{Discount, PaymentType, PosProduct, ProductGroup};
use super::{pricing, PosService, DISCOUNT_COLUMNS, GROUP_COLUMNS, PAYMENT_TYPE_COLUMNS, PRODUCT_COLUMNS};

impl PosService {
    // =========================================================================
    // Products
    // =========================================================================

    pub async fn get_product(&self, id: i32) -> ServiceResult<ProductView> {
        require_id("product_id", i64::from(id))?;
        let mut conn = self.db.pool().acquire().await?;
        let views = self.load_product_views(&mut conn, &[id]).await?;
        views
            .into_values()
            .next()
            .ok_or_else(|| ServiceError::not_found("product not found"))
    }

    pub async fn get_product_by_code(&self, product_code: &str) -> ServiceResult<ProductView> {
        let code = require_str("product_code", product_code)?;
        let id: Option<i32> = sqlx::query_scalar("SELECT id FROM pos.products WHERE product_code = $1")
            .bind(code)
            .fetch_optional(self.db.pool())
            .await?;
        match id {
            Some(id) => self.get_product(id).await,
            None => Err(ServiceError::not_found("product not found")),
        }
    }

    /// Lists products; filters compose with AND.
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
             AND ($2::integer IS NULL OR product_group_id = $2) \
             AND ($3::text IS NULL OR product_code ILIKE $3 OR product_name ILIKE $3)";

        let count_sql = format!("SELECT COUNT(*) FROM pos.products WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.is_active)
            .bind(req.product_group_id)
            .bind(&search)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM pos.products WHERE {condition} \
             ORDER BY id LIMIT $4 OFFSET $5"
        );
        let products: Vec<PosProduct> = sqlx::query_as(&rows_sql)
            .bind(req.is_active)
            .bind(req.product_group_id)
            .bind(&search)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let mut conn = self.db.pool().acquire().await?;
        let group_ids: Vec<i32> = products.iter().filter_map(|p| p.product_group_id).collect();
        let groups = super::load_groups_by_ids(&mut conn, &group_ids).await?;

        let products = products
            .into_iter()
            .map(|p| {
                let product_group = p.product_group_id.and_then(|id| groups.get(&id).cloned());
                ProductView {
                    product: p,
                    product_group,
                }
            })
            .collect();

        Ok(ListProductsResponse {
            products,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Product groups
    // =========================================================================

    pub async fn list_product_groups(
        &self,
        req: ListProductGroupsRequest,
    ) -> ServiceResult<ListProductGroupsResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let condition = "($1::boolean IS NULL OR is_active = $1) \
             AND ($2::integer IS NULL OR parent_group_id = $2)";

        let count_sql = format!("SELECT COUNT(*) FROM pos.product_groups WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.is_active)
            .bind(req.parent_group_id)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT {GROUP_COLUMNS} FROM pos.product_groups WHERE {condition} \
             ORDER BY id LIMIT $3 OFFSET $4"
        );
        let groups: Vec<ProductGroup> = sqlx::query_as(&rows_sql)
            .bind(req.is_active)
            .bind(req.parent_group_id)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        // Eager-load the member products for the listed groups.
        let group_ids: Vec<i32> = groups.iter().map(|g| g.id).collect();
        let mut products_by_group: HashMap<i32, Vec<PosProduct>> = HashMap::new();
        if !group_ids.is_empty() {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM pos.products WHERE product_group_id = ANY($1) \
                 ORDER BY id"
            );
            let products: Vec<PosProduct> = sqlx::query_as(&sql)
                .bind(&group_ids)
                .fetch_all(self.db.pool())
                .await?;
            for product in products {
                if let Some(group_id) = product.product_group_id {
                    products_by_group.entry(group_id).or_default().push(product);
                }
            }
        }

        let product_groups = groups
            .into_iter()
            .map(|g| {
                let products = products_by_group.remove(&g.id).unwrap_or_default();
                ProductGroupView { group: g, products }
            })
            .collect();

        Ok(ListProductGroupsResponse {
            product_groups,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    /// Loads a group and all of its descendants as a nested tree.
    ///
    /// The parent/child edges form a tree of unbounded depth, so the
    /// descendants are fetched with a recursive query rather than repeated
    /// round-trips.
    pub async fn get_product_group_tree(&self, root_id: i32) -> ServiceResult<ProductGroupTree> {
        require_id("product_group_id", i64::from(root_id))?;

        let sql = "WITH RECURSIVE tree AS ( \
                SELECT id, product_group_name, parent_group_id, color, image_url, \
                       commission_rate, is_active, created_at, updated_at \
                  FROM pos.product_groups WHERE id = $1 \
                UNION ALL \
                SELECT g.id, g.product_group_name, g.parent_group_id, g.color, g.image_url, \
                       g.commission_rate, g.is_active, g.created_at, g.updated_at \
                  FROM pos.product_groups g \
                  JOIN tree t ON g.parent_group_id = t.id \
             ) SELECT * FROM tree";
        let nodes: Vec<ProductGroup> = sqlx::query_as(sql)
            .bind(root_id)
            .fetch_all(self.db.pool())
            .await?;

        build_group_tree(root_id, nodes)
            .ok_or_else(|| ServiceError::not_found("product group not found"))
    }

    // =========================================================================
    // Payment types
    // =========================================================================

    pub async fn list_payment_types(
        &self,
        req: ListPaymentTypesRequest,
    ) -> ServiceResult<ListPaymentTypesResponse> {
        let sql = format!(
            "SELECT {PAYMENT_TYPE_COLUMNS} FROM pos.payment_types \
             WHERE ($1::boolean IS NULL OR is_active = $1) ORDER BY id"
        );
        let payment_types: Vec<PaymentType> = sqlx::query_as(&sql)
            .bind(req.is_active)
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListPaymentTypesResponse { payment_types })
    }

    // =========================================================================
    // Discounts
    // =========================================================================

    pub async fn list_discounts(
        &self,
        req: ListDiscountsRequest,
    ) -> ServiceResult<ListDiscountsResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let search = req
            .search_term
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let condition = "($1::boolean IS NULL OR d.is_active = $1) \
             AND ($2::integer IS NULL OR d.product_id = $2) \
             AND ($3::text IS NULL OR d.discount_name ILIKE $3 OR p.product_name ILIKE $3 \
                  OR pg.product_group_name ILIKE $3)";
        let joins = "FROM pos.discounts d \
             LEFT JOIN pos.products p ON p.id = d.product_id \
             LEFT JOIN pos.product_groups pg ON pg.id = d.product_group_id";

        let count_sql = format!("SELECT COUNT(*) {joins} WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.is_active)
            .bind(req.product_id)
            .bind(&search)
            .fetch_one(self.db.pool())
            .await?;

        let rows_sql = format!(
            "SELECT d.id, d.discount_name, d.discount_type, d.discount_value, d.product_id, \
             d.product_group_id, d.min_quantity, d.max_usage_per_transaction, d.valid_from, \
             d.valid_until, d.is_active, d.created_at, d.updated_at \
             {joins} WHERE {condition} ORDER BY d.id LIMIT $4 OFFSET $5"
        );
        let discounts: Vec<Discount> = sqlx::query_as(&rows_sql)
            .bind(req.is_active)
            .bind(req.product_id)
            .bind(&search)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListDiscountsResponse {
            discounts,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    /// Checks whether a discount can be applied, and computes the amount it
    /// would yield for the given product and quantity.
    pub async fn validate_discount(
        &self,
        req: ValidateDiscountRequest,
    ) -> ServiceResult<ValidateDiscountResponse> {
        require_id("discount_id", i64::from(req.discount_id))?;

        let invalid = |reason: &str| ValidateDiscountResponse {
            is_valid: false,
            reason: Some(reason.to_string()),
            calculated_discount_amount: Money::ZERO,
        };

        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM pos.discounts WHERE id = $1");
        let discount: Discount = sqlx::query_as(&sql)
            .bind(req.discount_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("discount not found"))?;

        if !discount.is_active {
            return Ok(invalid("discount is not active"));
        }

        let now = Utc::now();
        if let Some(from) = discount.valid_from {
            if now < from {
                return Ok(invalid(&format!(
                    "discount will be valid from {}",
                    from.format("%Y-%m-%d %H:%M:%S")
                )));
            }
        }
        if let Some(until) = discount.valid_until {
            if now > until {
                return Ok(invalid(&format!(
                    "discount expired on {}",
                    until.format("%Y-%m-%d %H:%M:%S")
                )));
            }
        }

        let mut product: Option<PosProduct> = None;
        if let Some(product_id) = req.product_id {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM pos.products WHERE id = $1");
            let found: Option<PosProduct> = sqlx::query_as(&sql)
                .bind(product_id)
                .fetch_optional(self.db.pool())
                .await?;

            let found = match found {
                Some(found) => found,
                None => return Ok(invalid("product not found")),
            };
            if !found.is_active {
                return Ok(invalid("product is not active"));
            }
            if let Some(scope_product) = discount.product_id {
                if scope_product != product_id {
                    return Ok(invalid(&format!(
                        "discount only applies to product id {scope_product}"
                    )));
                }
            }
            if let Some(scope_group) = discount.product_group_id {
                match found.product_group_id {
                    None => return Ok(invalid("product does not belong to any group")),
                    Some(group) if group != scope_group => {
                        return Ok(invalid(&format!(
                            "discount only applies to product group id {scope_group}"
                        )));
                    }
                    Some(_) => {}
                }
            }
            product = Some(found);
        }

        let quantity = req.quantity.unwrap_or(1);
        if quantity <= 0 {
            return Ok(invalid("quantity must be greater than 0"));
        }
        if quantity < discount.min_quantity {
            return Ok(invalid(&format!(
                "minimum quantity required: {} (current: {})",
                discount.min_quantity, quantity
            )));
        }

        let calculated_discount_amount = match &product {
            Some(product) => pricing::discount_amount(
                discount.discount_type,
                discount.discount_value,
                product.product_price,
                quantity,
                discount.min_quantity,
            ),
            None => Money::ZERO,
        };

        Ok(ValidateDiscountResponse {
            is_valid: true,
            reason: None,
            calculated_discount_amount,
        })
    }
}

/// Assembles the flat recursive-query result into a nested tree.
fn build_group_tree(root_id: i32, nodes: Vec<ProductGroup>) -> Option<ProductGroupTree> {
    let mut children_of: HashMap<i32, Vec<ProductGroup>> = HashMap::new();
    let mut root = None;
    for node in nodes {
        if node.id == root_id {
            root = Some(node);
        } else if let Some(parent) = node.parent_group_id {
            children_of.entry(parent).or_default().push(node);
        }
    }

    fn attach(
        group: ProductGroup,
        children_of: &mut HashMap<i32, Vec<ProductGroup>>,
    ) -> ProductGroupTree {
        let child_groups = children_of
            .remove(&group.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children_of))
            .collect();
        ProductGroupTree {
            group,
            child_groups,
        }
    }

    Some(attach(root?, &mut children_of))
}
