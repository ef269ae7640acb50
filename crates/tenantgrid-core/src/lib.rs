//! tenantgrid-core: shared types, error taxonomy, and configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::TenantGridConfig;
pub use error::{ErrorKind, TenantError, TenantResult};
pub use types::*;
