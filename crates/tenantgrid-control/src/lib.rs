//! tenantgrid-control: control-plane access and credential resolution.
//!
//! # Architecture
//!
//! ```text
//! ControlPlane<S: ControlStore>  (one per process)
//!        ↓
//! CredentialResolver  ──uses──→  Cipher (master key)
//!        ↓
//! TenantRoutingRecord / ConnectionDescriptor
//! ```
//!
//! `PgControlStore` talks to the control database through sqlx;
//! `MemoryControlStore` backs tests and local runs.

pub mod control_plane;
pub mod memory;
pub mod postgres;
pub mod resolver;
pub mod store;

pub use control_plane::ControlPlane;
pub use memory::MemoryControlStore;
pub use postgres::PgControlStore;
pub use resolver::CredentialResolver;
pub use store::ControlStore;
