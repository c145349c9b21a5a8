//! Request and response types for the identity service.
//!
//! Monetary request fields arrive as wire strings and are parsed (and
//! rejected) before any transaction; response fields use the fixed-scale
//! `Money`/`Rate` types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercur_core::money::{Money, Rate};
use mercur_core::pagination::{PageRequest, Pagination};
use mercur_core::types::CommissionType;

use super::model::{CommissionTier, Employee, Role, User};
use super::tiers::TierSpec;

// =============================================================================
// Views
// =============================================================================

/// A user as returned to callers. The password field is always blanked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub role_id: i32,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub role: Option<Role>,
}

impl UserView {
    pub fn from_user(user: User, role: Option<Role>) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            email: user.email,
            password: String::new(),
            firstname: user.firstname,
            lastname: user.lastname,
            role_id: user.role_id,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
            role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeView {
    pub id: i64,
    pub employee_name: String,
    pub position: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub hire_date: Option<NaiveDate>,
    pub base_salary: Money,
    pub commission_rate: Rate,
    pub commission_type: CommissionType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub commission_tiers: Vec<CommissionTier>,
}

impl EmployeeView {
    pub fn from_employee(employee: Employee, commission_tiers: Vec<CommissionTier>) -> Self {
        EmployeeView {
            id: employee.id,
            employee_name: employee.employee_name,
            position: employee.position,
            phone: employee.phone,
            email: employee.email,
            address: employee.address,
            hire_date: employee.hire_date,
            base_salary: employee.base_salary,
            commission_rate: employee.commission_rate,
            commission_type: employee.commission_type,
            is_active: employee.is_active,
            created_at: employee.created_at,
            updated_at: employee.updated_at,
            commission_tiers,
        }
    }
}

// =============================================================================
// Authentication & registration
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub role_id: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateUserResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

// =============================================================================
// User management
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub id: i64,
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub role_id: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListUsersRequest {
    pub is_active: Option<bool>,
    pub role_id: Option<i32>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserView>,
    pub pagination: Pagination,
}

// =============================================================================
// Role management
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleRequest {
    pub role_name: String,
    #[serde(default)]
    pub access_level: i32,
    #[serde(default)]
    pub permissions: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRolesRequest {
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRolesResponse {
    pub roles: Vec<Role>,
    pub pagination: Pagination,
}

// =============================================================================
// Employee management
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployeeRequest {
    pub employee_name: String,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// `YYYY-MM-DD`.
    pub hire_date: Option<String>,
    pub base_salary: String,
    pub commission_rate: String,
    pub commission_type: CommissionType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub id: i64,
    pub employee_name: Option<String>,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub base_salary: Option<String>,
    pub commission_rate: Option<String>,
    pub commission_type: Option<CommissionType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEmployeesRequest {
    pub is_active: Option<bool>,
    /// Substring match on position.
    pub position: Option<String>,
    #[serde(default)]
    pub pagination: PageRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEmployeesResponse {
    pub employees: Vec<EmployeeView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceCommissionTiersRequest {
    pub employee_id: i64,
    pub tiers: Vec<TierSpec>,
}
