//! Commission calculation: single, re-, and bulk calculation.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::PgConnection;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::{Money, Rate};
use mercur_core::types::{CommissionStatus, CommissionType, DocumentType};
use mercur_core::validation::{date_range_bounds, parse_date, require_id};

use super::calc::{self, TierBand};
use super::lifecycle::ensure_transition;
use super::messages::*;
use super::model::{CommissionCalculation, CommissionDetail};
use super::{CommissionService, BULK_CONCURRENCY, CALCULATION_COLUMNS};

#[derive(sqlx::FromRow)]
struct EmployeeCommissionInfo {
    commission_type: CommissionType,
    commission_rate: Rate,
}

#[derive(sqlx::FromRow)]
struct SalesLine {
    id: i64,
    product_id: i32,
    line_total: Money,
    document_number: String,
    product_name: String,
}

/// A computed detail row, not yet persisted.
pub(crate) struct NewDetail {
    order_item_id: i64,
    product_id: i32,
    sales_amount: Money,
    commission_rate: Rate,
    commission_amount: Money,
    product_name: String,
    order_document_number: String,
}

/// The result of running the calculation algorithm.
pub(crate) struct CalculationOutcome {
    pub total_sales: Money,
    pub base_commission: Money,
    pub bonus_commission: Money,
    pub total_commission: Money,
    pub details: Vec<NewDetail>,
    pub breakdown: CommissionBreakdown,
}

impl CommissionService {
    /// Runs the calculation algorithm for one employee period without
    /// touching the `commission` schema.
    pub(crate) async fn calculate_commission_logic(
        &self,
        employee_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> ServiceResult<CalculationOutcome> {
        let employee: EmployeeCommissionInfo = sqlx::query_as(
            "SELECT commission_type, commission_rate FROM directory.employees \
             WHERE id = $1 AND is_active = TRUE",
        )
        .bind(employee_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("employee {employee_id} not found")))?;

        let bands: Vec<TierBand> = if employee.commission_type == CommissionType::Tiered {
            let rows: Vec<(Money, Option<Money>, Rate)> = sqlx::query_as(
                "SELECT min_sales_amount, max_sales_amount, commission_rate \
                 FROM directory.commission_tiers WHERE employee_id = $1 \
                 ORDER BY min_sales_amount ASC",
            )
            .bind(employee_id)
            .fetch_all(self.db.pool())
            .await?;
            rows.into_iter()
                .map(|(min, max, rate)| TierBand { min, max, rate })
                .collect()
        } else {
            Vec::new()
        };

        // Completed sale lines served by this employee, commission-eligible
        // products only. Read-only cross-schema join.
        let (since, until) = date_range_bounds(period_start, period_end)?;
        let sales: Vec<SalesLine> = sqlx::query_as(
            "SELECT oi.id, oi.product_id, oi.line_total, od.document_number, p.product_name \
             FROM pos.order_items oi \
             JOIN pos.order_documents od ON od.id = oi.document_id \
             JOIN pos.products p ON p.id = oi.product_id \
             WHERE oi.serving_employee_id = $1 AND p.commission_eligible = TRUE \
               AND od.document_type = $2 AND od.orders_date >= $3 AND od.orders_date < $4 \
             ORDER BY oi.id",
        )
        .bind(employee_id)
        .bind(DocumentType::Sale)
        .bind(since)
        .bind(until)
        .fetch_all(self.db.pool())
        .await?;

        let total_sales = sales
            .iter()
            .fold(Money::ZERO, |acc, line| acc + line.line_total);

        let mut tier_commissions = Vec::new();
        let total_commission = match employee.commission_type {
            CommissionType::Percentage => {
                calc::percentage_commission(employee.commission_rate, total_sales)
            }
            CommissionType::Tiered => {
                let (total, portions) = calc::tiered_commission(&bands, total_sales);
                tier_commissions = portions
                    .into_iter()
                    .map(|p| TierCommission {
                        tier_min_amount: p.tier_min,
                        tier_max_amount: p.tier_max,
                        tier_rate: p.tier_rate,
                        tier_sales_amount: p.tier_sales_amount,
                        tier_commission: p.tier_commission,
                    })
                    .collect();
                total
            }
            CommissionType::FixedAmount => {
                calc::fixed_commission(employee.commission_rate, sales.len())
            }
        };
        let base_commission = total_commission;
        let bonus_commission = Money::ZERO;

        // Proportional allocation; each line earns its share of the total.
        let details = sales
            .into_iter()
            .map(|line| NewDetail {
                order_item_id: line.id,
                product_id: line.product_id,
                sales_amount: line.line_total,
                commission_rate: employee.commission_rate,
                commission_amount: line.line_total.allocate(total_commission, total_sales),
                product_name: line.product_name,
                order_document_number: line.document_number,
            })
            .collect();

        let breakdown = CommissionBreakdown {
            total_sales,
            base_commission_rate: employee.commission_rate,
            base_commission_amount: base_commission,
            tier_commissions,
            bonus_commission,
            total_commission,
            effective_commission_rate: Rate::effective(total_commission, total_sales)
                .to_percent_string(),
        };

        Ok(CalculationOutcome {
            total_sales,
            base_commission,
            bonus_commission,
            total_commission,
            details,
            breakdown,
        })
    }

    /// Calculates a commission; persists it unless `save_calculation` is
    /// false (preview mode).
    pub async fn calculate_commission(
        &self,
        req: CalculateCommissionRequest,
    ) -> ServiceResult<CalculateCommissionResponse> {
        require_id("employee_id", req.employee_id)?;
        require_id("calculated_by", req.calculated_by)?;
        let period_start = parse_date("period_start", &req.period_start)?;
        let period_end = parse_date("period_end", &req.period_end)?;

        let outcome = self
            .calculate_commission_logic(req.employee_id, period_start, period_end)
            .await?;

        if !req.save_calculation {
            let commission_calculation =
                preview_view(req.employee_id, period_start, period_end, req.calculated_by, &outcome);
            return Ok(CalculateCommissionResponse {
                commission_calculation,
                breakdown: outcome.breakdown,
                is_preview: true,
            });
        }

        let mut tx = self.db.pool().begin().await?;
        let calculation_id = insert_calculation(
            &mut tx,
            req.employee_id,
            period_start,
            period_end,
            req.calculated_by,
            &outcome,
        )
        .await?;
        tx.commit().await?;

        self.invalidate_commission_caches(&[], &[req.employee_id])
            .await;

        info!(
            calculation_id,
            employee_id = req.employee_id,
            total = %outcome.total_commission,
            "commission calculated"
        );

        let mut conn = self.db.pool().acquire().await?;
        let commission_calculation = self.load_calculation_view(&mut conn, calculation_id).await?;
        Ok(CalculateCommissionResponse {
            commission_calculation,
            breakdown: outcome.breakdown,
            is_preview: false,
        })
    }

    /// Re-runs a saved calculation over its stored period: details are
    /// replaced, header totals overwritten, status reset to CALCULATED and
    /// the approval cleared.
    pub async fn recalculate_commission(
        &self,
        req: RecalculateCommissionRequest,
    ) -> ServiceResult<RecalculateCommissionResponse> {
        require_id("commission_calculation_id", req.commission_calculation_id)?;
        require_id("recalculated_by", req.recalculated_by)?;

        let sql = format!(
            "SELECT {CALCULATION_COLUMNS} FROM commission.commission_calculations WHERE id = $1"
        );
        let existing: CommissionCalculation = sqlx::query_as(&sql)
            .bind(req.commission_calculation_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "commission calculation {} not found",
                    req.commission_calculation_id
                ))
            })?;
        ensure_transition(existing.status, CommissionStatus::Calculated)?;

        let outcome = self
            .calculate_commission_logic(
                existing.employee_id,
                existing.calculation_period_start,
                existing.calculation_period_end,
            )
            .await?;

        let mut tx = self.db.pool().begin().await?;

        let locked: CommissionCalculation = {
            let sql = format!(
                "SELECT {CALCULATION_COLUMNS} FROM commission.commission_calculations \
                 WHERE id = $1 FOR UPDATE"
            );
            sqlx::query_as(&sql)
                .bind(existing.id)
                .fetch_one(&mut *tx)
                .await?
        };
        ensure_transition(locked.status, CommissionStatus::Calculated)?;

        sqlx::query(
            "DELETE FROM commission.commission_details WHERE commission_calculation_id = $1",
        )
        .bind(existing.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE commission.commission_calculations SET total_sales = $2, \
             base_commission = $3, bonus_commission = $4, total_commission = $5, status = $6, \
             calculated_by = $7, notes = COALESCE($8, notes), approved_by = NULL, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(existing.id)
        .bind(outcome.total_sales)
        .bind(outcome.base_commission)
        .bind(outcome.bonus_commission)
        .bind(outcome.total_commission)
        .bind(CommissionStatus::Calculated)
        .bind(req.recalculated_by)
        .bind(&req.notes)
        .execute(&mut *tx)
        .await?;

        insert_details(&mut tx, existing.id, &outcome.details).await?;
        tx.commit().await?;

        self.invalidate_commission_caches(&[existing.id], &[existing.employee_id])
            .await;

        let mut conn = self.db.pool().acquire().await?;
        let commission_calculation = self.load_calculation_view(&mut conn, existing.id).await?;
        Ok(RecalculateCommissionResponse {
            commission_calculation,
            breakdown: outcome.breakdown,
        })
    }

    /// Calculates for many employees with bounded fan-out. Each employee is
    /// an independent transaction; failures are collected, never aggregated
    /// into a rollback.
    pub async fn bulk_calculate_commissions(
        &self,
        req: BulkCalculateCommissionsRequest,
    ) -> ServiceResult<BulkCalculateCommissionsResponse> {
        if req.employee_ids.is_empty() {
            return Err(ServiceError::invalid_argument("employee_ids required"));
        }
        require_id("calculated_by", req.calculated_by)?;
        let period_start = parse_date("period_start", &req.period_start)?;
        let period_end = parse_date("period_end", &req.period_end)?;

        let semaphore = Arc::new(Semaphore::new(BULK_CONCURRENCY));
        let mut tasks: JoinSet<(i64, ServiceResult<CalculationView>)> = JoinSet::new();

        for employee_id in req.employee_ids {
            let service = self.clone();
            let semaphore = semaphore.clone();
            let calculated_by = req.calculated_by;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = service
                    .calculate_and_save(employee_id, period_start, period_end, calculated_by)
                    .await;
                (employee_id, result)
            });
        }

        let mut calculations = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(view))) => calculations.push(view),
                Ok((employee_id, Err(e))) => {
                    errors.push(format!("employee id {employee_id}: {e}"));
                }
                Err(e) => errors.push(format!("calculation task failed: {e}")),
            }
        }

        Ok(BulkCalculateCommissionsResponse {
            success_count: calculations.len() as i32,
            error_count: errors.len() as i32,
            calculations,
            errors,
        })
    }

    async fn calculate_and_save(
        &self,
        employee_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
        calculated_by: i64,
    ) -> ServiceResult<CalculationView> {
        let outcome = self
            .calculate_commission_logic(employee_id, period_start, period_end)
            .await?;

        let mut tx = self.db.pool().begin().await?;
        let calculation_id = insert_calculation(
            &mut tx,
            employee_id,
            period_start,
            period_end,
            calculated_by,
            &outcome,
        )
        .await?;
        tx.commit().await?;

        self.invalidate_commission_caches(&[], &[employee_id]).await;

        let mut conn = self.db.pool().acquire().await?;
        self.load_calculation_view(&mut conn, calculation_id).await
    }
}

/// Inserts a CALCULATED header plus its detail rows; returns the header id.
pub(crate) async fn insert_calculation(
    conn: &mut PgConnection,
    employee_id: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
    calculated_by: i64,
    outcome: &CalculationOutcome,
) -> ServiceResult<i64> {
    let calculation_id: i64 = sqlx::query_scalar(
        "INSERT INTO commission.commission_calculations \
         (employee_id, calculation_period_start, calculation_period_end, total_sales, \
          base_commission, bonus_commission, total_commission, status, calculated_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(employee_id)
    .bind(period_start)
    .bind(period_end)
    .bind(outcome.total_sales)
    .bind(outcome.base_commission)
    .bind(outcome.bonus_commission)
    .bind(outcome.total_commission)
    .bind(CommissionStatus::Calculated)
    .bind(calculated_by)
    .fetch_one(&mut *conn)
    .await?;

    insert_details(conn, calculation_id, &outcome.details).await?;
    Ok(calculation_id)
}

async fn insert_details(
    conn: &mut PgConnection,
    calculation_id: i64,
    details: &[NewDetail],
) -> ServiceResult<()> {
    for detail in details {
        sqlx::query(
            "INSERT INTO commission.commission_details \
             (commission_calculation_id, order_item_id, product_id, sales_amount, \
              commission_rate, commission_amount, product_name, order_document_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(calculation_id)
        .bind(detail.order_item_id)
        .bind(detail.product_id)
        .bind(detail.sales_amount)
        .bind(detail.commission_rate)
        .bind(detail.commission_amount)
        .bind(&detail.product_name)
        .bind(&detail.order_document_number)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Builds the unsaved view returned by preview calculations.
fn preview_view(
    employee_id: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
    calculated_by: i64,
    outcome: &CalculationOutcome,
) -> CalculationView {
    let now = Utc::now();
    let commission_details = outcome
        .details
        .iter()
        .map(|d| CommissionDetail {
            id: 0,
            commission_calculation_id: 0,
            order_item_id: d.order_item_id,
            product_id: d.product_id,
            sales_amount: d.sales_amount,
            commission_rate: d.commission_rate,
            commission_amount: d.commission_amount,
            product_name: Some(d.product_name.clone()),
            order_document_number: Some(d.order_document_number.clone()),
            created_at: now,
            updated_at: now,
        })
        .collect();

    CalculationView {
        calculation: CommissionCalculation {
            id: 0,
            employee_id,
            calculation_period_start: period_start,
            calculation_period_end: period_end,
            total_sales: outcome.total_sales,
            base_commission: outcome.base_commission,
            bonus_commission: outcome.bonus_commission,
            total_commission: outcome.total_commission,
            status: CommissionStatus::Calculated,
            calculated_by,
            approved_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
        },
        commission_details,
        commission_payment: None,
    }
}
