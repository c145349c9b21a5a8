//! Commission queries and reporting aggregates.
//!
//! Full calculations are cached for 24 hours, per-employee summaries for
//! two hours; every mutating operation invalidates the affected keys.

use std::collections::HashMap;

use mercur_cache::cache;
use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::{Money, Rate};
use mercur_core::pagination::Pagination;
use mercur_core::types::CommissionStatus;
use mercur_core::validation::{parse_date, require_id};

use super::messages::*;
use super::model::{CommissionCalculation, CommissionPayment};
use super::{CommissionService, CALCULATION_COLUMNS, PAYMENT_COLUMNS};

#[derive(sqlx::FromRow)]
struct AggregateRow {
    total_sales: Money,
    total_earned: Money,
    total_paid: Money,
    calculation_count: i64,
}

#[derive(sqlx::FromRow)]
struct EmployeeAggregateRow {
    employee_id: i64,
    total_sales: Money,
    total_earned: Money,
    total_paid: Money,
    calculation_count: i64,
}

impl CommissionService {
    /// Loads one calculation, served from cache when possible.
    pub async fn get_commission_calculation(&self, id: i64) -> ServiceResult<CalculationView> {
        require_id("commission_calculation_id", id)?;

        let cache_key = cache::commission_calculation_key(id);
        if let Some(cached) = self.cache.get_json::<CalculationView>(&cache_key).await {
            return Ok(cached);
        }

        let mut conn = self.db.pool().acquire().await?;
        let view = self.load_calculation_view(&mut conn, id).await?;
        self.cache
            .set_json(&cache_key, &view, cache::TTL_CALCULATION)
            .await;
        Ok(view)
    }

    pub async fn list_commission_calculations(
        &self,
        req: ListCommissionCalculationsRequest,
    ) -> ServiceResult<ListCommissionCalculationsResponse> {
        const DEFAULT_PAGE: i32 = 20;

        let (period_start, period_end) = match &req.calculation_period {
            Some(range) if !range.start_date.is_empty() && !range.end_date.is_empty() => (
                Some(parse_date("start_date", &range.start_date)?),
                Some(parse_date("end_date", &range.end_date)?),
            ),
            _ => (None, None),
        };
        let status = req.status.map(|s| s.as_i32());

        let condition = "($1::bigint IS NULL OR employee_id = $1) \
             AND ($2::integer IS NULL OR status = $2) \
             AND ($3::date IS NULL OR calculation_period_start >= $3) \
             AND ($4::date IS NULL OR calculation_period_end <= $4)";

        let count_sql = format!(
            "SELECT COUNT(*) FROM commission.commission_calculations WHERE {condition}"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(req.employee_id)
            .bind(status)
            .bind(period_start)
            .bind(period_end)
            .fetch_one(self.db.pool())
            .await?;

        let ids_sql = format!(
            "SELECT id FROM commission.commission_calculations WHERE {condition} \
             ORDER BY created_at DESC LIMIT $5 OFFSET $6"
        );
        let ids: Vec<i64> = sqlx::query_scalar(&ids_sql)
            .bind(req.employee_id)
            .bind(status)
            .bind(period_start)
            .bind(period_end)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let mut conn = self.db.pool().acquire().await?;
        let mut commission_calculations = Vec::with_capacity(ids.len());
        for id in ids {
            commission_calculations.push(self.load_calculation_view(&mut conn, id).await?);
        }

        Ok(ListCommissionCalculationsResponse {
            commission_calculations,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    pub async fn get_commission_payment(
        &self,
        commission_calculation_id: i64,
    ) -> ServiceResult<CommissionPayment> {
        require_id("commission_calculation_id", commission_calculation_id)?;

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM commission.commission_payments \
             WHERE commission_calculation_id = $1"
        );
        sqlx::query_as(&sql)
            .bind(commission_calculation_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "no payment for commission calculation {commission_calculation_id}"
                ))
            })
    }

    /// Aggregates an employee's calculations intersecting the range.
    pub async fn get_commission_summary(
        &self,
        req: GetCommissionSummaryRequest,
    ) -> ServiceResult<CommissionSummary> {
        require_id("employee_id", req.employee_id)?;
        let range_start = parse_date("start_date", &req.date_range.start_date)?;
        let range_end = parse_date("end_date", &req.date_range.end_date)?;

        let cache_key = cache::commission_summary_key(
            req.employee_id,
            &req.date_range.start_date,
            &req.date_range.end_date,
        );
        if let Some(cached) = self.cache.get_json::<CommissionSummary>(&cache_key).await {
            return Ok(cached);
        }

        let employee_name: String =
            sqlx::query_scalar("SELECT employee_name FROM directory.employees WHERE id = $1")
                .bind(req.employee_id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or_else(|| {
                    ServiceError::not_found(format!("employee {} not found", req.employee_id))
                })?;

        // Calculations intersecting [range_start, range_end].
        let condition = "employee_id = $1 \
             AND calculation_period_start <= $3 AND calculation_period_end >= $2";

        let agg_sql = format!(
            "SELECT COALESCE(SUM(total_sales), 0) AS total_sales, \
             COALESCE(SUM(total_commission), 0) AS total_earned, \
             COALESCE(SUM(CASE WHEN status = $4 THEN total_commission ELSE 0 END), 0) \
                 AS total_paid, \
             COUNT(*) AS calculation_count \
             FROM commission.commission_calculations WHERE {condition}"
        );
        let agg: AggregateRow = sqlx::query_as(&agg_sql)
            .bind(req.employee_id)
            .bind(range_start)
            .bind(range_end)
            .bind(CommissionStatus::Paid)
            .fetch_one(self.db.pool())
            .await?;

        let recent_sql = format!(
            "SELECT {CALCULATION_COLUMNS} FROM commission.commission_calculations \
             WHERE {condition} ORDER BY created_at DESC LIMIT 5"
        );
        let recent: Vec<CommissionCalculation> = sqlx::query_as(&recent_sql)
            .bind(req.employee_id)
            .bind(range_start)
            .bind(range_end)
            .fetch_all(self.db.pool())
            .await?;

        let summary = CommissionSummary {
            employee_id: req.employee_id,
            employee_name,
            period: req.date_range.clone(),
            total_sales: agg.total_sales,
            total_commission_earned: agg.total_earned,
            total_commission_paid: agg.total_paid,
            commission_pending: agg.total_earned - agg.total_paid,
            average_commission_rate: Rate::effective(agg.total_earned, agg.total_sales)
                .to_percent_string(),
            calculation_count: agg.calculation_count,
            recent_calculations: recent
                .into_iter()
                .map(|calculation| CalculationView {
                    calculation,
                    commission_details: Vec::new(),
                    commission_payment: None,
                })
                .collect(),
        };

        self.cache
            .set_json(&cache_key, &summary, cache::TTL_SUMMARY)
            .await;
        Ok(summary)
    }

    /// Platform-wide report grouped by employee; pagination counts distinct
    /// employees.
    pub async fn get_commission_report(
        &self,
        req: GetCommissionReportRequest,
    ) -> ServiceResult<GetCommissionReportResponse> {
        const DEFAULT_PAGE: i32 = 20;

        let range_start = parse_date("start_date", &req.date_range.start_date)?;
        let range_end = parse_date("end_date", &req.date_range.end_date)?;
        let status = req.status.map(|s| s.as_i32());

        let condition = "calculation_period_start <= $2 AND calculation_period_end >= $1 \
             AND ($3::bigint IS NULL OR employee_id = $3) \
             AND ($4::integer IS NULL OR status = $4)";

        let totals_sql = format!(
            "SELECT COALESCE(SUM(total_sales), 0) AS total_sales, \
             COALESCE(SUM(total_commission), 0) AS total_earned, \
             COALESCE(SUM(CASE WHEN status = $5 THEN total_commission ELSE 0 END), 0) \
                 AS total_paid, \
             COUNT(*) AS calculation_count \
             FROM commission.commission_calculations WHERE {condition}"
        );
        let overall: AggregateRow = sqlx::query_as(&totals_sql)
            .bind(range_start)
            .bind(range_end)
            .bind(req.employee_id)
            .bind(status)
            .bind(CommissionStatus::Paid)
            .fetch_one(self.db.pool())
            .await?;

        let count_sql = format!(
            "SELECT COUNT(DISTINCT employee_id) FROM commission.commission_calculations \
             WHERE {condition}"
        );
        let total_employees: i64 = sqlx::query_scalar(&count_sql)
            .bind(range_start)
            .bind(range_end)
            .bind(req.employee_id)
            .bind(status)
            .fetch_one(self.db.pool())
            .await?;

        let group_sql = format!(
            "SELECT employee_id, \
             COALESCE(SUM(total_sales), 0) AS total_sales, \
             COALESCE(SUM(total_commission), 0) AS total_earned, \
             COALESCE(SUM(CASE WHEN status = $5 THEN total_commission ELSE 0 END), 0) \
                 AS total_paid, \
             COUNT(*) AS calculation_count \
             FROM commission.commission_calculations WHERE {condition} \
             GROUP BY employee_id ORDER BY employee_id LIMIT $6 OFFSET $7"
        );
        let rows: Vec<EmployeeAggregateRow> = sqlx::query_as(&group_sql)
            .bind(range_start)
            .bind(range_end)
            .bind(req.employee_id)
            .bind(status)
            .bind(CommissionStatus::Paid)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let employee_ids: Vec<i64> = rows.iter().map(|r| r.employee_id).collect();
        let names: HashMap<i64, String> = if employee_ids.is_empty() {
            HashMap::new()
        } else {
            let pairs: Vec<(i64, String)> = sqlx::query_as(
                "SELECT id, employee_name FROM directory.employees WHERE id = ANY($1)",
            )
            .bind(&employee_ids)
            .fetch_all(self.db.pool())
            .await?;
            pairs.into_iter().collect()
        };

        let employee_summaries = rows
            .into_iter()
            .map(|row| CommissionSummary {
                employee_id: row.employee_id,
                employee_name: names.get(&row.employee_id).cloned().unwrap_or_default(),
                period: req.date_range.clone(),
                total_sales: row.total_sales,
                total_commission_earned: row.total_earned,
                total_commission_paid: row.total_paid,
                commission_pending: row.total_earned - row.total_paid,
                average_commission_rate: Rate::effective(row.total_earned, row.total_sales)
                    .to_percent_string(),
                calculation_count: row.calculation_count,
                recent_calculations: Vec::new(),
            })
            .collect();

        Ok(GetCommissionReportResponse {
            employee_summaries,
            total_commissions_calculated: overall.total_earned,
            total_commissions_paid: overall.total_paid,
            total_commissions_pending: overall.total_earned - overall.total_paid,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total_employees),
        })
    }

    /// An employee's commission configuration: rate, type and tier table.
    pub async fn get_commission_settings(
        &self,
        employee_id: i64,
    ) -> ServiceResult<GetCommissionSettingsResponse> {
        require_id("employee_id", employee_id)?;

        #[derive(sqlx::FromRow)]
        struct EmployeeRow {
            id: i64,
            employee_name: String,
            position: String,
            commission_rate: Rate,
            commission_type: mercur_core::CommissionType,
        }

        let employee: EmployeeRow = sqlx::query_as(
            "SELECT id, employee_name, position, commission_rate, commission_type \
             FROM directory.employees WHERE id = $1",
        )
        .bind(employee_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("employee {employee_id} not found")))?;

        let tier_settings: Vec<CommissionTierSetting> =
            if employee.commission_type == mercur_core::CommissionType::Tiered {
                let rows: Vec<(Money, Option<Money>, Rate)> = sqlx::query_as(
                    "SELECT min_sales_amount, max_sales_amount, commission_rate \
                     FROM directory.commission_tiers WHERE employee_id = $1 \
                     ORDER BY min_sales_amount ASC",
                )
                .bind(employee_id)
                .fetch_all(self.db.pool())
                .await?;
                rows.into_iter()
                    .map(|(min, max, rate)| CommissionTierSetting {
                        min_sales_amount: min,
                        max_sales_amount: max,
                        commission_rate: rate,
                    })
                    .collect()
            } else {
                Vec::new()
            };

        Ok(GetCommissionSettingsResponse {
            employee: EmployeeSummary {
                id: employee.id,
                employee_name: employee.employee_name,
                position: (!employee.position.is_empty()).then_some(employee.position),
                commission_rate: employee.commission_rate,
                commission_type: employee.commission_type,
            },
            tier_settings,
        })
    }
}
