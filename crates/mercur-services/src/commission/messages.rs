//! Request and response types for the commission service.

use serde::{Deserialize, Serialize};

use mercur_core::money::{Money, Rate};
use mercur_core::pagination::{PageRequest, Pagination};
use mercur_core::types::{CommissionStatus, CommissionType};
use mercur_core::validation::DateRange;

use super::model::{CommissionCalculation, CommissionDetail, CommissionPayment};

// =============================================================================
// Views
// =============================================================================

/// A calculation with its details and payment. Also the shape cached under
/// `commission_calculation:<id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationView {
    #[serde(flatten)]
    pub calculation: CommissionCalculation,
    pub commission_details: Vec<CommissionDetail>,
    pub commission_payment: Option<CommissionPayment>,
}

/// One band's contribution in a tiered breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierCommission {
    pub tier_min_amount: Money,
    pub tier_max_amount: Option<Money>,
    pub tier_rate: Rate,
    pub tier_sales_amount: Money,
    pub tier_commission: Money,
}

/// How a calculation's total was reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub total_sales: Money,
    pub base_commission_rate: Rate,
    pub base_commission_amount: Money,
    pub tier_commissions: Vec<TierCommission>,
    pub bonus_commission: Money,
    pub total_commission: Money,
    /// `total / sales × 100`, formatted at scale 2.
    pub effective_commission_rate: String,
}

// =============================================================================
// Calculation
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CalculateCommissionRequest {
    pub employee_id: i64,
    /// `YYYY-MM-DD`; the end date is inclusive.
    pub period_start: String,
    pub period_end: String,
    pub calculated_by: i64,
    /// When false the calculation is a preview and nothing is persisted.
    #[serde(default)]
    pub save_calculation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalculateCommissionResponse {
    pub commission_calculation: CalculationView,
    pub breakdown: CommissionBreakdown,
    pub is_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecalculateCommissionRequest {
    pub commission_calculation_id: i64,
    pub recalculated_by: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculateCommissionResponse {
    pub commission_calculation: CalculationView,
    pub breakdown: CommissionBreakdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCalculateCommissionsRequest {
    pub employee_ids: Vec<i64>,
    pub period_start: String,
    pub period_end: String,
    pub calculated_by: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkCalculateCommissionsResponse {
    pub calculations: Vec<CalculationView>,
    pub errors: Vec<String>,
    pub success_count: i32,
    pub error_count: i32,
}

// =============================================================================
// Management
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCommissionCalculationsRequest {
    pub employee_id: Option<i64>,
    pub status: Option<CommissionStatus>,
    pub calculation_period: Option<DateRange>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListCommissionCalculationsResponse {
    pub commission_calculations: Vec<CalculationView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveCommissionRequest {
    pub commission_calculation_id: i64,
    pub approved_by: i64,
    pub approval_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectCommissionRequest {
    pub commission_calculation_id: i64,
    pub rejected_by: i64,
    pub rejection_reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkApproveCommissionsRequest {
    pub commission_calculation_ids: Vec<i64>,
    pub approved_by: i64,
    pub approval_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkApproveCommissionsResponse {
    pub approved_calculations: Vec<CalculationView>,
    pub errors: Vec<String>,
    pub success_count: i32,
    pub error_count: i32,
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PayCommissionRequest {
    pub commission_calculation_id: i64,
    pub payment_type_id: i32,
    /// `YYYY-MM-DD`; defaults to today.
    pub payment_date: Option<String>,
    pub reference_number: Option<String>,
    pub paid_by: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayCommissionResponse {
    pub commission_payment: CommissionPayment,
    pub updated_calculation: CalculationView,
}

// =============================================================================
// Reporting
// =============================================================================

/// Per-employee aggregate over a period. Also the shape cached under
/// `commission_summary:<employee>:<start>:<end>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub employee_id: i64,
    pub employee_name: String,
    pub period: DateRange,
    pub total_sales: Money,
    pub total_commission_earned: Money,
    pub total_commission_paid: Money,
    /// `earned − paid`.
    pub commission_pending: Money,
    /// `earned / sales × 100`, formatted at scale 2.
    pub average_commission_rate: String,
    pub calculation_count: i64,
    pub recent_calculations: Vec<CalculationView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetCommissionSummaryRequest {
    pub employee_id: i64,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetCommissionReportRequest {
    pub date_range: DateRange,
    pub employee_id: Option<i64>,
    pub status: Option<CommissionStatus>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetCommissionReportResponse {
    /// Grouped by employee, paginated by distinct employee count.
    pub employee_summaries: Vec<CommissionSummary>,
    pub total_commissions_calculated: Money,
    pub total_commissions_paid: Money,
    pub total_commissions_pending: Money,
    pub pagination: Pagination,
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeSummary {
    pub id: i64,
    pub employee_name: String,
    pub position: Option<String>,
    pub commission_rate: Rate,
    pub commission_type: CommissionType,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommissionTierSetting {
    pub min_sales_amount: Money,
    pub max_sales_amount: Option<Money>,
    pub commission_rate: Rate,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetCommissionSettingsResponse {
    pub employee: EmployeeSummary,
    pub tier_settings: Vec<CommissionTierSetting>,
}
