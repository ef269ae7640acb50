//! Application-facing entry point.
//!
//! `TenantConnections` wires the control plane, credential resolver, pool
//! registry and idle sweeper together. Build one at startup, share it, and
//! call [`TenantConnections::shutdown`] on the way out.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use tenantgrid_cipher::Cipher;
use tenantgrid_control::{ControlPlane, ControlStore, CredentialResolver, PgControlStore};
use tenantgrid_core::{TenantError, TenantGridConfig, TenantId, TenantResult, TenantRoutingRecord};

use crate::connector::{PgConnector, PoolConnector};
use crate::registry::TenantPoolRegistry;
use crate::sweeper::{IdleSweeper, SweeperHandle};

/// Production wiring: Postgres control store and Postgres tenant pools.
pub type PgTenantConnections = TenantConnections<PgControlStore, PgConnector>;

pub struct TenantConnections<S, C: PoolConnector> {
    registry: Arc<TenantPoolRegistry<S, C>>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl<S: ControlStore, C: PoolConnector> TenantConnections<S, C> {
    /// Assemble the layer and, if enabled in `config`, start the sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(control: ControlPlane<S>, cipher: Cipher, connector: C, config: &TenantGridConfig) -> Self {
        let resolver = CredentialResolver::from_config(control, cipher, config);
        let registry = Arc::new(TenantPoolRegistry::new(
            resolver,
            connector,
            config.pool.connect_timeout,
        ));
        let sweeper = config.sweeper.enabled.then(|| {
            IdleSweeper::spawn(
                Arc::clone(&registry),
                config.sweeper.interval,
                config.sweeper.idle_threshold,
            )
        });
        if sweeper.is_none() {
            warn!("idle sweeper disabled; tenant pools are only closed at shutdown");
        }
        Self {
            registry,
            sweeper: Mutex::new(sweeper),
        }
    }

    /// The control-database connection.
    pub fn main_connection(&self) -> TenantResult<&S> {
        self.registry.resolver().control().main_connection()
    }

    /// The live pool for tenant `id`, created on first use.
    pub async fn tenant_connection(&self, id: TenantId) -> TenantResult<C::Pool> {
        self.registry.get(id).await
    }

    pub async fn tenant_routing_by_slug(&self, slug: &str) -> TenantResult<TenantRoutingRecord> {
        self.registry.resolver().resolve_tenant_routing_by_slug(slug).await
    }

    /// Tenants whose `key` setting equals `expected` after decryption.
    pub async fn list_tenants_with_setting(&self, key: &str, expected: &str) -> TenantResult<Vec<TenantId>> {
        self.registry
            .resolver()
            .list_tenants_with_setting(key, expected)
            .await
    }

    pub fn cipher(&self) -> &Cipher {
        self.registry.resolver().cipher()
    }

    pub fn registry(&self) -> &Arc<TenantPoolRegistry<S, C>> {
        &self.registry
    }

    /// Stop the sweeper, close every tenant pool, then close the control
    /// connection. Every step runs even if an earlier one fails.
    pub async fn shutdown(&self) -> ShutdownReport {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.stop().await;
        }

        let drained = self.registry.shutdown().await;
        let mut report = ShutdownReport {
            pools_closed: drained.closed,
            failures: drained
                .failures
                .into_iter()
                .map(|(id, error)| ShutdownFailure {
                    component: format!("tenant {id}"),
                    error,
                })
                .collect(),
        };

        if let Err(error) = self.registry.resolver().control().close().await {
            report.failures.push(ShutdownFailure {
                component: "control plane".into(),
                error,
            });
        }

        if report.is_clean() {
            info!(pools_closed = report.pools_closed, "tenant connections shut down");
        } else {
            warn!(
                pools_closed = report.pools_closed,
                failures = report.failures.len(),
                "tenant connections shut down with errors"
            );
        }
        report
    }
}

impl TenantConnections<PgControlStore, PgConnector> {
    /// Connect to the control database and start the layer.
    pub async fn connect(config: &TenantGridConfig, cipher: Cipher) -> TenantResult<Self> {
        config.validate()?;
        let control = ControlPlane::connect(&config.control).await?;
        Ok(Self::start(control, cipher, PgConnector, config))
    }
}

/// One teardown step that failed.
#[derive(Debug)]
pub struct ShutdownFailure {
    pub component: String,
    pub error: TenantError,
}

/// Outcome of [`TenantConnections::shutdown`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub pools_closed: usize,
    pub failures: Vec<ShutdownFailure>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pool(s) closed", self.pools_closed)?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.component, failure.error)?;
        }
        Ok(())
    }
}
