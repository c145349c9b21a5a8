//! JSON cache over Redis.
//!
//! Cache reads fall back to the database on any miss or error; writes and
//! invalidations are fire-and-forget with error logging. A cache failure
//! never fails the enclosing operation.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use mercur_core::error::ServiceResult;

// =============================================================================
// Keys and TTL classes
// =============================================================================

pub const TTL_SHORT: Duration = Duration::from_secs(5 * 60);
pub const TTL_MEDIUM: Duration = Duration::from_secs(30 * 60);
pub const TTL_LONG: Duration = Duration::from_secs(2 * 60 * 60);

/// Full commission calculations keep for a day.
pub const TTL_CALCULATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Commission summaries keep for two hours.
pub const TTL_SUMMARY: Duration = TTL_LONG;

pub const INVENTORY_STOCKS_KEY: &str = "inventory:stocks";
pub const INVENTORY_PRODUCTS_KEY: &str = "inventory:products";
pub const INVENTORY_WAREHOUSES_KEY: &str = "inventory:warehouses";
pub const INVENTORY_PRODUCT_TYPES_KEY: &str = "inventory:products-type";
pub const POS_PRODUCT_KEY: &str = "pos:product";
pub const POS_PRODUCT_GROUP_KEY: &str = "pos:product-group";
pub const USER_EMPLOYEE_KEY: &str = "user:employee";
pub const ROLES_LIST_KEY: &str = "roles:list";

pub fn inventory_product_key(product_id: i32) -> String {
    format!("inventory:{product_id}")
}

pub fn pos_product_key(product_id: i32) -> String {
    format!("pos:{product_id}")
}

pub fn user_key(user_id: i64) -> String {
    format!("user:{user_id}")
}

pub fn commission_calculation_key(calculation_id: i64) -> String {
    format!("commission_calculation:{calculation_id}")
}

pub fn commission_summary_key(employee_id: i64, start: &str, end: &str) -> String {
    format!("commission_summary:{employee_id}:{start}:{end}")
}

// =============================================================================
// Cache client
// =============================================================================

/// Shared Redis handle. Cloning is cheap; the underlying connection manager
/// multiplexes and reconnects on its own.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connects and pings the cache server.
    pub async fn connect(url: &str) -> ServiceResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Cache { conn })
    }

    /// Reads a cached JSON value. Any error or decode failure reads as a
    /// miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, falling back to database");
                None
            }
        }
    }

    /// Stores a JSON value with a TTL. Failures are logged and swallowed.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache value");
                return;
            }
        };
        let mut conn = self.conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, raw, ttl.as_secs())
            .await
        {
            warn!(key, error = %e, "cache write failed");
        }
    }

    /// Deletes the given keys. Failures are logged and swallowed.
    pub async fn invalidate(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut conn = self.conn.clone();
        if let Err(e) = conn.del::<_, ()>(keys.to_vec()).await {
            warn!(?keys, error = %e, "cache invalidation failed");
        }
    }

    /// Deletes every key starting with `prefix` (SCAN + DEL). Used for
    /// range-parameterized keys like the commission summaries, where the
    /// exact set of cached ranges is unknown. Failures are logged and
    /// swallowed.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        loop {
            let scanned: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            let (next_cursor, keys) = match scanned {
                Ok(result) => result,
                Err(e) => {
                    warn!(pattern, error = %e, "cache scan failed");
                    return;
                }
            };
            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(keys).await {
                    warn!(pattern, error = %e, "cache invalidation failed");
                }
            }
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_builders() {
        assert_eq!(commission_calculation_key(42), "commission_calculation:42");
        assert_eq!(
            commission_summary_key(7, "2026-01-01", "2026-01-31"),
            "commission_summary:7:2026-01-01:2026-01-31"
        );
        assert_eq!(inventory_product_key(3), "inventory:3");
        assert_eq!(user_key(12), "user:12");
    }

    #[test]
    fn ttl_classes() {
        assert_eq!(TTL_SHORT.as_secs(), 300);
        assert_eq!(TTL_MEDIUM.as_secs(), 1800);
        assert_eq!(TTL_LONG.as_secs(), 7200);
        assert_eq!(TTL_CALCULATION.as_secs(), 86400);
    }
}
