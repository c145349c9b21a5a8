//! Commission engine: calculation over employee sales, tiered math, the
//! approval/payment state machine, and reporting aggregates.
//!
//! The engine reads `directory.employees` / `directory.commission_tiers`
//! and `pos.order_items` read-only; it owns the `commission` schema.

pub mod calc;
pub mod calculate;
pub mod lifecycle;
pub mod messages;
pub mod model;
pub mod reporting;

use sqlx::PgConnection;

use mercur_cache::{cache, Cache};
use mercur_core::error::{ServiceError, ServiceResult};
use mercur_db::Database;

use self::messages::CalculationView;
use self::model::{CommissionCalculation, CommissionDetail, CommissionPayment};

pub(crate) const CALCULATION_COLUMNS: &str = "id, employee_id, calculation_period_start, \
     calculation_period_end, total_sales, base_commission, bonus_commission, total_commission, \
     status, calculated_by, approved_by, notes, created_at, updated_at";

pub(crate) const DETAIL_COLUMNS: &str = "id, commission_calculation_id, order_item_id, \
     product_id, sales_amount, commission_rate, commission_amount, product_name, \
     order_document_number, created_at, updated_at";

pub(crate) const PAYMENT_COLUMNS: &str = "id, commission_calculation_id, employee_id, \
     payment_amount, payment_date, payment_type_id, reference_number, paid_by, notes, created_at";

/// Maximum concurrent sub-tasks for bulk operations.
pub(crate) const BULK_CONCURRENCY: usize = 8;

/// Commission engine service. Cloning shares the pool and cache handles.
#[derive(Clone)]
pub struct CommissionService {
    pub(crate) db: Database,
    pub(crate) cache: Cache,
}

impl CommissionService {
    pub fn new(db: Database, cache: Cache) -> Self {
        CommissionService { db, cache }
    }

    /// Drops the cached calculations and every cached summary range of the
    /// affected employees.
    pub(crate) async fn invalidate_commission_caches(
        &self,
        calculation_ids: &[i64],
        employee_ids: &[i64],
    ) {
        let keys: Vec<String> = calculation_ids
            .iter()
            .map(|id| cache::commission_calculation_key(*id))
            .collect();
        self.cache.invalidate(&keys).await;
        for employee_id in employee_ids {
            self.cache
                .invalidate_prefix(&format!("commission_summary:{employee_id}:"))
                .await;
        }
    }

    /// Loads a calculation with its details and payment.
    pub(crate) async fn load_calculation_view(
        &self,
        conn: &mut PgConnection,
        calculation_id: i64,
    ) -> ServiceResult<CalculationView> {
        let sql = format!(
            "SELECT {CALCULATION_COLUMNS} FROM commission.commission_calculations WHERE id = $1"
        );
        let calculation: CommissionCalculation = sqlx::query_as(&sql)
            .bind(calculation_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "commission calculation {calculation_id} not found"
                ))
            })?;

        let sql = format!(
            "SELECT {DETAIL_COLUMNS} FROM commission.commission_details \
             WHERE commission_calculation_id = $1 ORDER BY id"
        );
        let commission_details: Vec<CommissionDetail> = sqlx::query_as(&sql)
            .bind(calculation_id)
            .fetch_all(&mut *conn)
            .await?;

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM commission.commission_payments \
             WHERE commission_calculation_id = $1"
        );
        let commission_payment: Option<CommissionPayment> = sqlx::query_as(&sql)
            .bind(calculation_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(CalculationView {
            calculation,
            commission_details,
            commission_payment,
        })
    }
}
