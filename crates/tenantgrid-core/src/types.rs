//! Domain types for tenant routing and connection descriptors.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stable numeric tenant identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl TenantId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        TenantId(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(TenantId)
            .map_err(|_| format!("invalid tenant id: {s}"))
    }
}

/// One row of the control database's tenant routing table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRoutingRecord {
    pub id: TenantId,
    pub name: String,
    /// Name of the tenant's own business database.
    pub database_name: String,
    /// Unique public handle, if the tenant has one.
    pub slug: Option<String>,
    /// Soft-delete marker (epoch seconds).
    pub deleted_at: Option<u64>,
}

impl TenantRoutingRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One tenant-scoped key/value setting from the control database.
///
/// Not `Serialize`; `Debug` omits the value.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantSetting {
    pub tenant_id: TenantId,
    pub key: String,
    /// Opaque value; ciphertext when `is_encrypted` is set.
    pub value: String,
    pub is_encrypted: bool,
}

impl fmt::Debug for TenantSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantSetting")
            .field("tenant_id", &self.tenant_id)
            .field("key", &self.key)
            .field("is_encrypted", &self.is_encrypted)
            .finish_non_exhaustive()
    }
}

/// Setting keys that carry a tenant's database connection parameters.
pub mod setting_keys {
    pub const DB_HOST: &str = "db_host";
    pub const DB_PORT: &str = "db_port";
    pub const DB_USER: &str = "db_user";
    pub const DB_PASSWORD: &str = "db_password";

    /// Keys that must all be present to build a connection descriptor.
    pub const REQUIRED: [&str; 4] = [DB_HOST, DB_PORT, DB_USER, DB_PASSWORD];
}

/// Pool sizing applied to every tenant pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSizing {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Per-connection idle timeout inside the pool (not the registry's eviction threshold).
    pub idle_timeout: Duration,
    /// Time to wait for a connection when the pool is saturated.
    pub acquire_timeout: Duration,
}

impl Default for PoolSizing {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            idle_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Encryption-in-transit flags applied uniformly to every tenant pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    pub encrypt: bool,
    pub trust_server_certificate: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            encrypt: false,
            trust_server_certificate: true,
        }
    }
}

/// Everything needed to open one tenant's pool.
///
/// Built fresh for each pool creation and dropped once the pool is open.
/// Deliberately not `Serialize`, and `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool: PoolSizing,
    pub transport: TransportOptions,
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("pool", &self.pool)
            .field("transport", &self.transport)
            .finish()
    }
}
