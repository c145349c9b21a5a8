//! # Mercur Core
//!
//! Shared domain types for the Mercur POS platform.
//!
//! ## Crate Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          mercur-core                                    │
//! │                                                                         │
//! │  money       Money (scale 2) / Rate (scale 4) over rust_decimal        │
//! │  types       Closed enumerations with explicit wire tags               │
//! │  error       ServiceError + tonic::Status mapping                      │
//! │  pagination  Decimal page-number tokens                                │
//! │  validation  Pre-transaction input guards                              │
//! │  config      Environment configuration                                 │
//! │                                                                         │
//! │  Consumed by mercur-db, mercur-cache and every service in              │
//! │  mercur-services.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod money;
pub mod pagination;
pub mod types;
pub mod validation;

pub use config::{AppConfig, ConfigError, RedisConfig};
pub use error::{is_unique_violation, ServiceError, ServiceResult};
pub use money::{Money, MoneyError, Rate};
pub use pagination::{PageRequest, Pagination};
pub use types::{
    CartStatus, CommissionStatus, CommissionType, DiscountType, DocumentType, MovementType,
    PaidStatus, ReferenceType, CASH_PAYMENT_TYPE_ID,
};
