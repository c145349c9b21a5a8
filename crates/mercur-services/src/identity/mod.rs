//! Identity service: users, roles, employees, commission tiers,
//! authentication and token issuance.

pub mod auth;
pub mod messages;
pub mod model;
pub mod service;
pub mod tiers;

pub use self::auth::{Claims, TokenManager};
pub use self::service::IdentityService;
