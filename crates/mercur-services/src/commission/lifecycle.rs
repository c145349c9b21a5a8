//! The commission approval/payment state machine.
//!
//! Transitions take a `SELECT ... FOR UPDATE` lock on the calculation row
//! so concurrent decisions cannot split-brain. Commission status is
//! monotonic except for rejection, which sends a decision back to DRAFT and
//! clears the approver.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgConnection;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use mercur_core::error::{is_unique_violation, ServiceError, ServiceResult};
use mercur_core::types::CommissionStatus;
use mercur_core::validation::{parse_date, require_id, require_str};

use super::messages::*;
use super::model::{CommissionCalculation, CommissionPayment};
use super::{CommissionService, BULK_CONCURRENCY, CALCULATION_COLUMNS, PAYMENT_COLUMNS};

/// Checks one edge of the status machine.
///
/// Allowed: DRAFT→CALCULATED and CALCULATED→CALCULATED (calculation),
/// CALCULATED→APPROVED, CALCULATED→DRAFT and APPROVED→DRAFT (rejection),
/// APPROVED→PAID. Everything else is a failed precondition.
pub fn ensure_transition(
    current: CommissionStatus,
    target: CommissionStatus,
) -> ServiceResult<()> {
    use CommissionStatus::*;

    let allowed = matches!(
        (current, target),
        (Draft, Calculated)
            | (Calculated, Calculated)
            | (Calculated, Approved)
            | (Calculated, Draft)
            | (Approved, Draft)
            | (Approved, Paid)
    );

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::precondition(format!(
            "commission cannot move from {} to {}",
            current.name(),
            target.name()
        )))
    }
}

impl CommissionService {
    /// CALCULATED → APPROVED.
    pub async fn approve_commission(
        &self,
        req: ApproveCommissionRequest,
    ) -> ServiceResult<CalculationView> {
        require_id("commission_calculation_id", req.commission_calculation_id)?;
        require_id("approved_by", req.approved_by)?;

        self.approve_one(
            req.commission_calculation_id,
            req.approved_by,
            req.approval_notes.as_deref(),
        )
        .await
    }

    async fn approve_one(
        &self,
        calculation_id: i64,
        approved_by: i64,
        approval_notes: Option<&str>,
    ) -> ServiceResult<CalculationView> {
        let mut tx = self.db.pool().begin().await?;
        let calculation = lock_calculation(&mut tx, calculation_id).await?;
        ensure_transition(calculation.status, CommissionStatus::Approved)?;

        sqlx::query(
            "UPDATE commission.commission_calculations SET status = $2, approved_by = $3, \
             notes = COALESCE($4, notes), updated_at = NOW() WHERE id = $1",
        )
        .bind(calculation_id)
        .bind(CommissionStatus::Approved)
        .bind(approved_by)
        .bind(approval_notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.invalidate_commission_caches(&[calculation_id], &[calculation.employee_id])
            .await;

        info!(calculation_id, approved_by, "commission approved");

        let mut conn = self.db.pool().acquire().await?;
        self.load_calculation_view(&mut conn, calculation_id).await
    }

    /// Sends a decision back to DRAFT, clearing the approver and appending
    /// a timestamped rejection tag to the notes.
    pub async fn reject_commission(
        &self,
        req: RejectCommissionRequest,
    ) -> ServiceResult<CalculationView> {
        require_id("commission_calculation_id", req.commission_calculation_id)?;
        require_id("rejected_by", req.rejected_by)?;
        let reason = require_str("rejection_reason", &req.rejection_reason)?.to_string();

        let mut tx = self.db.pool().begin().await?;
        let calculation = lock_calculation(&mut tx, req.commission_calculation_id).await?;
        ensure_transition(calculation.status, CommissionStatus::Draft)?;

        let rejection_note = format!(
            "\n[REJECTED by user {} on {}]: {}",
            req.rejected_by,
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            reason
        );
        let notes = format!("{}{}", calculation.notes.unwrap_or_default(), rejection_note);

        sqlx::query(
            "UPDATE commission.commission_calculations SET status = $2, approved_by = NULL, \
             notes = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(req.commission_calculation_id)
        .bind(CommissionStatus::Draft)
        .bind(&notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.invalidate_commission_caches(
            &[req.commission_calculation_id],
            &[calculation.employee_id],
        )
        .await;

        let mut conn = self.db.pool().acquire().await?;
        self.load_calculation_view(&mut conn, req.commission_calculation_id)
            .await
    }

    /// Approves many calculations with bounded fan-out; each is its own
    /// transaction and failures are collected per id.
    pub async fn bulk_approve_commissions(
        &self,
        req: BulkApproveCommissionsRequest,
    ) -> ServiceResult<BulkApproveCommissionsResponse> {
        if req.commission_calculation_ids.is_empty() {
            return Err(ServiceError::invalid_argument(
                "commission_calculation_ids required",
            ));
        }
        require_id("approved_by", req.approved_by)?;

        let semaphore = Arc::new(Semaphore::new(BULK_CONCURRENCY));
        let mut tasks: JoinSet<(i64, ServiceResult<CalculationView>)> = JoinSet::new();

        for calculation_id in req.commission_calculation_ids {
            let service = self.clone();
            let semaphore = semaphore.clone();
            let approved_by = req.approved_by;
            let notes = req.approval_notes.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = service
                    .approve_one(calculation_id, approved_by, notes.as_deref())
                    .await;
                (calculation_id, result)
            });
        }

        let mut approved_calculations = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(view))) => approved_calculations.push(view),
                Ok((calculation_id, Err(e))) => {
                    errors.push(format!("calculation id {calculation_id}: {e}"));
                }
                Err(e) => errors.push(format!("approval task failed: {e}")),
            }
        }

        Ok(BulkApproveCommissionsResponse {
            success_count: approved_calculations.len() as i32,
            error_count: errors.len() as i32,
            approved_calculations,
            errors,
        })
    }

    /// APPROVED → PAID. Creates exactly one payment per calculation; the
    /// unique key enforces the invariant under concurrent calls.
    pub async fn pay_commission(
        &self,
        req: PayCommissionRequest,
    ) -> ServiceResult<PayCommissionResponse> {
        require_id("commission_calculation_id", req.commission_calculation_id)?;
        require_id("payment_type_id", i64::from(req.payment_type_id))?;
        require_id("paid_by", req.paid_by)?;

        let payment_date = match &req.payment_date {
            Some(raw) => parse_date("payment_date", raw)?,
            None => Utc::now().date_naive(),
        };

        let mut tx = self.db.pool().begin().await?;
        let calculation = lock_calculation(&mut tx, req.commission_calculation_id).await?;
        ensure_transition(calculation.status, CommissionStatus::Paid)?;

        let sql = format!(
            "INSERT INTO commission.commission_payments \
             (commission_calculation_id, employee_id, payment_amount, payment_date, \
              payment_type_id, reference_number, paid_by, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {PAYMENT_COLUMNS}"
        );
        let commission_payment: CommissionPayment = sqlx::query_as(&sql)
            .bind(calculation.id)
            .bind(calculation.employee_id)
            .bind(calculation.total_commission)
            .bind(payment_date)
            .bind(req.payment_type_id)
            .bind(&req.reference_number)
            .bind(req.paid_by)
            .bind(&req.notes)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::already_exists(format!(
                        "commission calculation {} is already paid",
                        calculation.id
                    ))
                } else {
                    e.into()
                }
            })?;

        sqlx::query(
            "UPDATE commission.commission_calculations SET status = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(calculation.id)
        .bind(CommissionStatus::Paid)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.invalidate_commission_caches(&[calculation.id], &[calculation.employee_id])
            .await;

        info!(
            calculation_id = calculation.id,
            amount = %commission_payment.payment_amount,
            "commission paid"
        );

        let mut conn = self.db.pool().acquire().await?;
        let updated_calculation = self.load_calculation_view(&mut conn, calculation.id).await?;
        Ok(PayCommissionResponse {
            commission_payment,
            updated_calculation,
        })
    }
}

/// Reads a calculation with a row-level write lock.
async fn lock_calculation(
    conn: &mut PgConnection,
    calculation_id: i64,
) -> ServiceResult<CommissionCalculation> {
    let sql = format!(
        "SELECT {CALCULATION_COLUMNS} FROM commission.commission_calculations \
         WHERE id = $1 FOR UPDATE"
    );
    sqlx::query_as(&sql)
        .bind(calculation_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| {
            ServiceError::not_found(format!(
                "commission calculation {calculation_id} not found"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use CommissionStatus::*;

    #[test]
    fn allowed_edges() {
        assert!(ensure_transition(Draft, Calculated).is_ok());
        assert!(ensure_transition(Calculated, Calculated).is_ok());
        assert!(ensure_transition(Calculated, Approved).is_ok());
        assert!(ensure_transition(Calculated, Draft).is_ok());
        assert!(ensure_transition(Approved, Draft).is_ok());
        assert!(ensure_transition(Approved, Paid).is_ok());
    }

    #[test]
    fn rejected_edges() {
        assert!(ensure_transition(Draft, Approved).is_err());
        assert!(ensure_transition(Draft, Paid).is_err());
        assert!(ensure_transition(Calculated, Paid).is_err());
        assert!(ensure_transition(Approved, Calculated).is_err());
        assert!(ensure_transition(Approved, Approved).is_err());
        assert!(ensure_transition(Paid, Draft).is_err());
        assert!(ensure_transition(Paid, Calculated).is_err());
        assert!(ensure_transition(Paid, Approved).is_err());
        assert!(ensure_transition(Paid, Paid).is_err());
    }

    #[test]
    fn error_message_names_states() {
        let err = ensure_transition(Paid, Draft).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("PAID"));
        assert!(message.contains("DRAFT"));
    }
}
