//! Pool connector seam: how a descriptor becomes an open pool.
//!
//! The registry needs little from a pool beyond opening and closing it, so
//! both sides are traits. [`PgConnector`] opens sqlx Postgres pools; tests
//! inject a counting double.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tracing::debug;

use tenantgrid_core::{ConnectionDescriptor, TenantError, TenantResult, TransportOptions};

/// A multiplexed pool handle the registry can cache and tear down.
///
/// Clones must share the underlying pool.
#[async_trait]
pub trait ManagedPool: Clone + Send + Sync + 'static {
    /// False once the pool has been closed or is otherwise unusable.
    fn is_connected(&self) -> bool;

    /// Close every connection in the pool.
    async fn close(&self) -> TenantResult<()>;
}

/// Opens a new pool from a descriptor.
#[async_trait]
pub trait PoolConnector: Send + Sync + 'static {
    type Pool: ManagedPool;

    /// Open and connect a pool. Errors propagate to the caller unretried.
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> TenantResult<Self::Pool>;
}

#[async_trait]
impl ManagedPool for PgPool {
    fn is_connected(&self) -> bool {
        !self.is_closed()
    }

    async fn close(&self) -> TenantResult<()> {
        PgPool::close(self).await;
        Ok(())
    }
}

/// Opens sqlx Postgres pools.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgConnector;

impl PgConnector {
    /// Map transport flags to a TLS mode.
    ///
    /// | encrypt | trust_server_certificate | mode         |
    /// |---------|--------------------------|--------------|
    /// | false   | any                      | `Disable`    |
    /// | true    | true                     | `Require`    |
    /// | true    | false                    | `VerifyFull` |
    pub fn ssl_mode(transport: TransportOptions) -> PgSslMode {
        match (transport.encrypt, transport.trust_server_certificate) {
            (false, _) => PgSslMode::Disable,
            (true, true) => PgSslMode::Require,
            (true, false) => PgSslMode::VerifyFull,
        }
    }

    pub fn connect_options(descriptor: &ConnectionDescriptor) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&descriptor.host)
            .port(descriptor.port)
            .username(&descriptor.user)
            .password(&descriptor.password)
            .database(&descriptor.database)
            .ssl_mode(Self::ssl_mode(descriptor.transport))
    }

    pub fn pool_options(descriptor: &ConnectionDescriptor) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(descriptor.pool.max_connections)
            .min_connections(descriptor.pool.min_connections)
            .idle_timeout(descriptor.pool.idle_timeout)
            .acquire_timeout(descriptor.pool.acquire_timeout)
    }
}

#[async_trait]
impl PoolConnector for PgConnector {
    type Pool = PgPool;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> TenantResult<PgPool> {
        debug!(
            host = %descriptor.host,
            port = descriptor.port,
            database = %descriptor.database,
            "opening postgres pool"
        );
        Self::pool_options(descriptor)
            .connect_with(Self::connect_options(descriptor))
            .await
            .map_err(TenantError::connection)
    }
}
