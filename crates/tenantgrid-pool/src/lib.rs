//! tenantgrid-pool: per-tenant connection pools.
//!
//! # Architecture
//!
//! ```text
//! TenantConnections
//!   ├── TenantPoolRegistry  (tenant id → live pool, single-flight creation)
//!   │      └── PoolConnector (PgConnector in production)
//!   └── IdleSweeper         (closes pools idle past the threshold)
//! ```

pub mod connections;
pub mod connector;
pub mod registry;
pub mod sweeper;

pub use connections::{PgTenantConnections, ShutdownFailure, ShutdownReport, TenantConnections};
pub use connector::{ManagedPool, PgConnector, PoolConnector};
pub use registry::{DrainReport, EntryInfo, SweepReport, TenantPoolRegistry};
pub use sweeper::{IdleSweeper, SweeperHandle};
