//! Identity service implementation.

use std::collections::HashMap;

use tracing::info;

use mercur_cache::cache::{self, Cache};
use mercur_core::error::{ServiceError, ServiceResult};
use mercur_core::money::{Money, Rate};
use mercur_core::pagination::Pagination;
use mercur_core::validation::{parse_date, require_id, require_str};
use mercur_db::Database;

use super::auth::TokenManager;
use super::messages::*;
use super::model::{CommissionTier, Employee, Role, User};
use super::tiers::validate_tiers;

const USER_COLUMNS: &str = "id, username, email, password, firstname, lastname, role_id, \
     is_active, last_login, created_at, updated_at";

const ROLE_COLUMNS: &str = "id, role_name, access_level, permissions, created_at, updated_at";

const EMPLOYEE_COLUMNS: &str = "id, employee_name, position, phone, email, address, hire_date, \
     base_salary, commission_rate, commission_type, is_active, created_at, updated_at";

const TIER_COLUMNS: &str =
    "id, employee_id, min_sales_amount, max_sales_amount, commission_rate, created_at, updated_at";

/// Employee/role/user records, password authentication, token issuance.
#[derive(Clone)]
pub struct IdentityService {
    db: Database,
    cache: Cache,
    tokens: TokenManager,
}

impl IdentityService {
    pub fn new(db: Database, cache: Cache, jwt_secret: &str) -> Self {
        IdentityService {
            db,
            cache,
            tokens: TokenManager::new(jwt_secret),
        }
    }

    async fn invalidate_user_caches(&self, user_ids: &[i64]) {
        let mut keys = vec![
            cache::USER_EMPLOYEE_KEY.to_string(),
            cache::ROLES_LIST_KEY.to_string(),
        ];
        keys.extend(user_ids.iter().map(|id| cache::user_key(*id)));
        self.cache.invalidate(&keys).await;
    }

    // =========================================================================
    // Authentication & registration
    // =========================================================================

    /// Registers a user, hashes the password and issues a bearer token.
    pub async fn create_user(&self, req: CreateUserRequest) -> ServiceResult<CreateUserResponse> {
        let username = require_str("username", &req.username)?.to_string();
        let email = require_str("email", &req.email)?.to_string();
        require_str("password", &req.password)?;
        require_id("role_id", i64::from(req.role_id))?;

        let duplicate: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM directory.users WHERE username = $1 OR email = $2",
        )
        .bind(&username)
        .bind(&email)
        .fetch_optional(self.db.pool())
        .await?;
        if duplicate.is_some() {
            return Err(ServiceError::already_exists("username or email already exists"));
        }

        let role = self
            .fetch_role(req.role_id)
            .await?
            .ok_or_else(|| ServiceError::invalid_argument("invalid role specified"))?;

        let password_hash = hash_password(&req.password)?;

        let sql = format!(
            "INSERT INTO directory.users (username, email, password, firstname, lastname, role_id, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE) RETURNING {USER_COLUMNS}"
        );
        let user: User = sqlx::query_as(&sql)
            .bind(&username)
            .bind(&email)
            .bind(&password_hash)
            .bind(&req.firstname)
            .bind(&req.lastname)
            .bind(req.role_id)
            .fetch_one(self.db.pool())
            .await?;

        let (token, expires_at) = self.tokens.generate(user.id, &user.username)?;
        self.invalidate_user_caches(&[]).await;

        info!(user_id = user.id, username = %user.username, "user registered");

        Ok(CreateUserResponse {
            token,
            expires_at,
            user: UserView::from_user(user, Some(role)),
        })
    }

    /// Verifies a username/password pair and issues a token.
    ///
    /// Failures are uniform ("invalid username or password") to avoid user
    /// enumeration.
    pub async fn authenticate(
        &self,
        req: AuthenticateRequest,
    ) -> ServiceResult<AuthenticateResponse> {
        require_str("username", &req.username)?;
        require_str("password", &req.password)?;

        let invalid =
            || ServiceError::Unauthenticated("invalid username or password".to_string());

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM directory.users WHERE username = $1 AND is_active = TRUE"
        );
        let user: User = sqlx::query_as(&sql)
            .bind(req.username.trim())
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&req.password, &user.password) {
            return Err(invalid());
        }

        sqlx::query("UPDATE directory.users SET last_login = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(self.db.pool())
            .await?;

        let (token, expires_at) = self.tokens.generate(user.id, &user.username)?;
        let role = self.fetch_role(user.role_id).await?;
        self.invalidate_user_caches(&[user.id]).await;

        info!(user_id = user.id, "login successful");

        Ok(AuthenticateResponse {
            token,
            expires_at,
            user: UserView::from_user(user, role),
        })
    }

    // =========================================================================
    // User management
    // =========================================================================

    pub async fn get_user(&self, id: i64) -> ServiceResult<UserView> {
        require_id("id", id)?;
        let sql = format!("SELECT {USER_COLUMNS} FROM directory.users WHERE id = $1");
        let user: User = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))?;
        let role = self.fetch_role(user.role_id).await?;
        Ok(UserView::from_user(user, role))
    }

    pub async fn update_user(&self, req: UpdateUserRequest) -> ServiceResult<UserView> {
        require_id("id", req.id)?;

        let sql = format!("SELECT {USER_COLUMNS} FROM directory.users WHERE id = $1");
        let current: User = sqlx::query_as(&sql)
            .bind(req.id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))?;

        let role_id = req.role_id.unwrap_or(current.role_id);
        let role = self
            .fetch_role(role_id)
            .await?
            .ok_or_else(|| ServiceError::invalid_argument("invalid role specified"))?;

        let sql = format!(
            "UPDATE directory.users SET email = $2, firstname = $3, lastname = $4, role_id = $5, \
             is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user: User = sqlx::query_as(&sql)
            .bind(req.id)
            .bind(req.email.unwrap_or(current.email))
            .bind(req.firstname.unwrap_or(current.firstname))
            .bind(req.lastname.unwrap_or(current.lastname))
            .bind(role_id)
            .bind(req.is_active.unwrap_or(current.is_active))
            .fetch_one(self.db.pool())
            .await?;

        self.invalidate_user_caches(&[user.id]).await;
        Ok(UserView::from_user(user, Some(role)))
    }

    pub async fn list_users(&self, req: ListUsersRequest) -> ServiceResult<ListUsersResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM directory.users \
             WHERE ($1::boolean IS NULL OR is_active = $1) \
               AND ($2::integer IS NULL OR role_id = $2)",
        )
        .bind(req.is_active)
        .bind(req.role_id)
        .fetch_one(self.db.pool())
        .await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM directory.users \
             WHERE ($1::boolean IS NULL OR is_active = $1) \
               AND ($2::integer IS NULL OR role_id = $2) \
             ORDER BY id LIMIT $3 OFFSET $4"
        );
        let users: Vec<User> = sqlx::query_as(&sql)
            .bind(req.is_active)
            .bind(req.role_id)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let role_ids: Vec<i32> = users.iter().map(|u| u.role_id).collect();
        let roles = self.fetch_roles_by_ids(&role_ids).await?;

        let users = users
            .into_iter()
            .map(|u| {
                let role = roles.get(&u.role_id).cloned();
                UserView::from_user(u, role)
            })
            .collect();

        Ok(ListUsersResponse {
            users,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Role management
    // =========================================================================

    pub async fn create_role(&self, req: CreateRoleRequest) -> ServiceResult<Role> {
        let role_name = require_str("role_name", &req.role_name)?.to_string();

        let duplicate: Option<i32> =
            sqlx::query_scalar("SELECT id FROM directory.roles WHERE role_name = $1")
                .bind(&role_name)
                .fetch_optional(self.db.pool())
                .await?;
        if duplicate.is_some() {
            return Err(ServiceError::already_exists("role name already exists"));
        }

        let sql = format!(
            "INSERT INTO directory.roles (role_name, access_level, permissions) \
             VALUES ($1, $2, $3) RETURNING {ROLE_COLUMNS}"
        );
        let role: Role = sqlx::query_as(&sql)
            .bind(&role_name)
            .bind(req.access_level)
            .bind(&req.permissions)
            .fetch_one(self.db.pool())
            .await?;

        self.cache
            .invalidate(&[cache::ROLES_LIST_KEY.to_string()])
            .await;
        Ok(role)
    }

    pub async fn list_roles(&self, req: ListRolesRequest) -> ServiceResult<ListRolesResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM directory.roles")
            .fetch_one(self.db.pool())
            .await?;

        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM directory.roles ORDER BY id LIMIT $1 OFFSET $2"
        );
        let roles: Vec<Role> = sqlx::query_as(&sql)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        Ok(ListRolesResponse {
            roles,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    // =========================================================================
    // Employee management
    // =========================================================================

    pub async fn create_employee(&self, req: CreateEmployeeRequest) -> ServiceResult<EmployeeView> {
        let employee_name = require_str("employee_name", &req.employee_name)?.to_string();
        let base_salary = Money::parse(&req.base_salary)
            .map_err(|_| ServiceError::invalid_argument("base_salary must be a decimal amount"))?;
        let commission_rate = Rate::parse(&req.commission_rate)
            .map_err(|_| ServiceError::invalid_argument("commission_rate must be a decimal rate"))?;
        let hire_date = match &req.hire_date {
            Some(raw) => Some(parse_date("hire_date", raw)?),
            None => None,
        };

        let sql = format!(
            "INSERT INTO directory.employees \
             (employee_name, position, phone, email, address, hire_date, base_salary, \
              commission_rate, commission_type, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE) RETURNING {EMPLOYEE_COLUMNS}"
        );
        let employee: Employee = sqlx::query_as(&sql)
            .bind(&employee_name)
            .bind(req.position.unwrap_or_default())
            .bind(req.phone.unwrap_or_default())
            .bind(req.email.unwrap_or_default())
            .bind(req.address.unwrap_or_default())
            .bind(hire_date)
            .bind(base_salary)
            .bind(commission_rate)
            .bind(req.commission_type)
            .fetch_one(self.db.pool())
            .await?;

        self.invalidate_user_caches(&[]).await;
        Ok(EmployeeView::from_employee(employee, Vec::new()))
    }

    pub async fn get_employee(&self, id: i64) -> ServiceResult<EmployeeView> {
        require_id("id", id)?;
        let employee = self.fetch_employee(id).await?;
        let tiers = self.fetch_tiers(id).await?;
        Ok(EmployeeView::from_employee(employee, tiers))
    }

    pub async fn update_employee(&self, req: UpdateEmployeeRequest) -> ServiceResult<EmployeeView> {
        require_id("id", req.id)?;
        let current = self.fetch_employee(req.id).await?;

        let base_salary = match &req.base_salary {
            Some(raw) => Money::parse(raw).map_err(|_| {
                ServiceError::invalid_argument("base_salary must be a decimal amount")
            })?,
            None => current.base_salary,
        };
        let commission_rate = match &req.commission_rate {
            Some(raw) => Rate::parse(raw).map_err(|_| {
                ServiceError::invalid_argument("commission_rate must be a decimal rate")
            })?,
            None => current.commission_rate,
        };

        let sql = format!(
            "UPDATE directory.employees SET employee_name = $2, position = $3, phone = $4, \
             email = $5, address = $6, base_salary = $7, commission_rate = $8, \
             commission_type = $9, is_active = $10, updated_at = NOW() \
             WHERE id = $1 RETURNING {EMPLOYEE_COLUMNS}"
        );
        let employee: Employee = sqlx::query_as(&sql)
            .bind(req.id)
            .bind(req.employee_name.unwrap_or(current.employee_name))
            .bind(req.position.unwrap_or(current.position))
            .bind(req.phone.unwrap_or(current.phone))
            .bind(req.email.unwrap_or(current.email))
            .bind(req.address.unwrap_or(current.address))
            .bind(base_salary)
            .bind(commission_rate)
            .bind(req.commission_type.unwrap_or(current.commission_type))
            .bind(req.is_active.unwrap_or(current.is_active))
            .fetch_one(self.db.pool())
            .await?;

        let tiers = self.fetch_tiers(employee.id).await?;
        self.invalidate_user_caches(&[]).await;
        Ok(EmployeeView::from_employee(employee, tiers))
    }

    pub async fn list_employees(
        &self,
        req: ListEmployeesRequest,
    ) -> ServiceResult<ListEmployeesResponse> {
        const DEFAULT_PAGE: i32 = 10;

        let position = req
            .position
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("%{}%", p.trim()));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM directory.employees \
             WHERE ($1::boolean IS NULL OR is_active = $1) \
               AND ($2::text IS NULL OR position ILIKE $2)",
        )
        .bind(req.is_active)
        .bind(&position)
        .fetch_one(self.db.pool())
        .await?;

        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM directory.employees \
             WHERE ($1::boolean IS NULL OR is_active = $1) \
               AND ($2::text IS NULL OR position ILIKE $2) \
             ORDER BY id LIMIT $3 OFFSET $4"
        );
        let employees: Vec<Employee> = sqlx::query_as(&sql)
            .bind(req.is_active)
            .bind(&position)
            .bind(req.pagination.size_or(DEFAULT_PAGE))
            .bind(req.pagination.offset(DEFAULT_PAGE))
            .fetch_all(self.db.pool())
            .await?;

        let ids: Vec<i64> = employees.iter().map(|e| e.id).collect();
        let mut tiers_by_employee = self.fetch_tiers_by_employees(&ids).await?;

        let employees = employees
            .into_iter()
            .map(|e| {
                let tiers = tiers_by_employee.remove(&e.id).unwrap_or_default();
                EmployeeView::from_employee(e, tiers)
            })
            .collect();

        Ok(ListEmployeesResponse {
            employees,
            pagination: Pagination::for_page(&req.pagination, DEFAULT_PAGE, total),
        })
    }

    /// Replaces an employee's tier table atomically after validating the
    /// coverage invariant (ascending, no overlaps, covers `[0, ∞)`).
    pub async fn replace_commission_tiers(
        &self,
        req: ReplaceCommissionTiersRequest,
    ) -> ServiceResult<EmployeeView> {
        require_id("employee_id", req.employee_id)?;
        let employee = self.fetch_employee(req.employee_id).await?;

        let mut tiers = req.tiers;
        tiers.sort_by(|a, b| a.min_sales_amount.cmp(&b.min_sales_amount));
        validate_tiers(&tiers)?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM directory.commission_tiers WHERE employee_id = $1")
            .bind(req.employee_id)
            .execute(&mut *tx)
            .await?;
        for tier in &tiers {
            sqlx::query(
                "INSERT INTO directory.commission_tiers \
                 (employee_id, min_sales_amount, max_sales_amount, commission_rate) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(req.employee_id)
            .bind(tier.min_sales_amount)
            .bind(tier.max_sales_amount)
            .bind(tier.commission_rate)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.invalidate_user_caches(&[]).await;
        let tiers = self.fetch_tiers(req.employee_id).await?;
        Ok(EmployeeView::from_employee(employee, tiers))
    }

    // =========================================================================
    // Fetch helpers
    // =========================================================================

    async fn fetch_role(&self, role_id: i32) -> ServiceResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM directory.roles WHERE id = $1");
        Ok(sqlx::query_as(&sql)
            .bind(role_id)
            .fetch_optional(self.db.pool())
            .await?)
    }

    async fn fetch_roles_by_ids(&self, ids: &[i32]) -> ServiceResult<HashMap<i32, Role>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {ROLE_COLUMNS} FROM directory.roles WHERE id = ANY($1)");
        let roles: Vec<Role> = sqlx::query_as(&sql)
            .bind(ids.to_vec())
            .fetch_all(self.db.pool())
            .await?;
        Ok(roles.into_iter().map(|r| (r.id, r)).collect())
    }

    async fn fetch_employee(&self, id: i64) -> ServiceResult<Employee> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM directory.employees WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::not_found("employee not found"))
    }

    async fn fetch_tiers(&self, employee_id: i64) -> ServiceResult<Vec<CommissionTier>> {
        let sql = format!(
            "SELECT {TIER_COLUMNS} FROM directory.commission_tiers \
             WHERE employee_id = $1 ORDER BY min_sales_amount ASC"
        );
        Ok(sqlx::query_as(&sql)
            .bind(employee_id)
            .fetch_all(self.db.pool())
            .await?)
    }

    async fn fetch_tiers_by_employees(
        &self,
        employee_ids: &[i64],
    ) -> ServiceResult<HashMap<i64, Vec<CommissionTier>>> {
        if employee_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT {TIER_COLUMNS} FROM directory.commission_tiers \
             WHERE employee_id = ANY($1) ORDER BY employee_id, min_sales_amount ASC"
        );
        let tiers: Vec<CommissionTier> = sqlx::query_as(&sql)
            .bind(employee_ids.to_vec())
            .fetch_all(self.db.pool())
            .await?;

        let mut grouped: HashMap<i64, Vec<CommissionTier>> = HashMap::new();
        for tier in tiers {
            grouped.entry(tier.employee_id).or_default().push(tier);
        }
        Ok(grouped)
    }
}

// =============================================================================
// Password hashing
// =============================================================================

/// Hashes a password with argon2 at default cost.
fn hash_password(password: &str) -> ServiceResult<String> {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::internal(format!("failed to hash password: {e}")))
}

/// Verifies a password against a stored argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert_ne!(hash, "s3cret-pass");
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
