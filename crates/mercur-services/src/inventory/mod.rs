//! Inventory service: products, warehouses, per-(product, warehouse) stock
//! balances and the append-only movement journal.
//!
//! The ledger invariant: `available_quantity >= 0` and
//! `reserved_quantity >= 0` on every stock row, and every mutation appends
//! exactly one movement row (transfers append two symmetric rows). All
//! mutating calls lock the stock row with `FOR UPDATE` inside one
//! transaction.

pub mod catalog;
pub mod messages;
pub mod model;
pub mod stock;

use mercur_cache::Cache;
use mercur_db::Database;

/// Stock ledger service. Cloning shares the pool and cache handles.
#[derive(Clone)]
pub struct InventoryService {
    pub(crate) db: Database,
    pub(crate) cache: Cache,
}

impl InventoryService {
    pub fn new(db: Database, cache: Cache) -> Self {
        InventoryService { db, cache }
    }

    /// Drops the domain index caches plus any per-product entries.
    pub(crate) async fn invalidate_inventory_caches(&self, product_ids: &[i32]) {
        use mercur_cache::cache::*;

        let mut keys = vec![
            INVENTORY_STOCKS_KEY.to_string(),
            INVENTORY_PRODUCTS_KEY.to_string(),
            INVENTORY_PRODUCT_TYPES_KEY.to_string(),
            INVENTORY_WAREHOUSES_KEY.to_string(),
        ];
        keys.extend(product_ids.iter().map(|id| inventory_product_key(*id)));
        self.cache.invalidate(&keys).await;
    }
}
