//! Error types shared by all Mercur services.
//!
//! Validation failures surface before any transaction is opened; domain
//! failures roll the enclosing transaction back; broker/cache errors never
//! fail the enclosing operation (they are logged at the call site).

use tonic::Status;

/// The error surface of every service operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed input. Raised before any transaction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-key conflict (document number, payment per calculation).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// State-machine violation: already paid, wrong status, insufficient
    /// stock.
    #[error("precondition failed: {0}")]
    FailedPrecondition(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        ServiceError::AlreadyExists(what.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        ServiceError::FailedPrecondition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ServiceError::Internal(msg.into())
    }
}

/// Convenience alias used throughout the services.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// True when the error is a PostgreSQL unique-constraint violation (23505).
///
/// Unique indexes on `document_number` and `commission_calculation_id` are
/// the conflict detectors for concurrent creation; callers translate the
/// violation into `AlreadyExists` with a domain message.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("record not found".to_string()),
            other if is_unique_violation(&other) => {
                ServiceError::AlreadyExists(other.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ServiceError::Unavailable("database pool unavailable".to_string())
            }
            other => ServiceError::Internal(format!("database error: {other}")),
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(err: redis::RedisError) -> Self {
        ServiceError::Unavailable(format!("cache error: {err}"))
    }
}

impl From<crate::money::MoneyError> for ServiceError {
    fn from(err: crate::money::MoneyError) -> Self {
        ServiceError::InvalidArgument(err.to_string())
    }
}

impl From<ServiceError> for Status {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::InvalidArgument(msg) => Status::invalid_argument(msg),
            ServiceError::NotFound(msg) => Status::not_found(msg),
            ServiceError::AlreadyExists(msg) => Status::already_exists(msg),
            ServiceError::FailedPrecondition(msg) => Status::failed_precondition(msg),
            ServiceError::Unauthenticated(msg) => Status::unauthenticated(msg),
            ServiceError::Internal(msg) => Status::internal(msg),
            ServiceError::Unavailable(msg) => Status::unavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: ServiceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn status_codes_match_error_kinds() {
        let status: Status = ServiceError::precondition("already paid").into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: Status = ServiceError::invalid_argument("cashier_id required").into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: Status = ServiceError::already_exists("document number").into();
        assert_eq!(status.code(), tonic::Code::AlreadyExists);
    }
}
