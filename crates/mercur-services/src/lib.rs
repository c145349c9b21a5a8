//! # Mercur Services
//!
//! The four cooperating services of the Mercur POS platform.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Mercur Services                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ IdentityService│  │InventoryService│  │ PosService                 ││
//! │  │                │  │                │  │                            ││
//! │  │ • CreateUser   │  │ • ReserveStock │  │ • Carts (open/checked out) ││
//! │  │ • Authenticate │  │ • ReleaseStock │  │ • CreateOrder / FromCart   ││
//! │  │ • Employees    │  │ • TransferStock│  │ • Payment / Void / Return  ││
//! │  │ • Tiers        │  │ • Movements    │  │ • publishes pos:events:*   ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────────┐                                                 │
//! │  │ CommissionService  │   Reads pos.order_items (read-only join on     │
//! │  │                    │   serving_employee_id) and directory.employees │
//! │  │ • Calculate/Bulk   │                                                 │
//! │  │ • Approve FSM      │                                                 │
//! │  │ • Pay / Reports    │                                                 │
//! │  └────────────────────┘                                                 │
//! │                                                                         │
//! │  Each service owns its schema; cross-service coupling is events and    │
//! │  synchronous reads only. Handlers are async methods returning          │
//! │  Result<Response, ServiceError>; transport wiring converts the error   │
//! │  into tonic::Status.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commission;
pub mod identity;
pub mod inventory;
pub mod pos;

pub use commission::CommissionService;
pub use identity::IdentityService;
pub use inventory::InventoryService;
pub use pos::PosService;
