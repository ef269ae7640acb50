//! Control-plane accessor, the process-wide connection to the control database.

use std::sync::Arc;

use tracing::{error, info};

use tenantgrid_core::config::ControlConfig;
use tenantgrid_core::{TenantError, TenantResult};

use crate::postgres::PgControlStore;
use crate::store::ControlStore;

/// Shared handle to the single control-database connection.
///
/// Created once at startup and cloned into everything that needs it.
pub struct ControlPlane<S> {
    store: Arc<S>,
}

impl<S> Clone for ControlPlane<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ControlStore> ControlPlane<S> {
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The control connection.
    ///
    /// A disconnected control plane is a process-level fault, reported as a
    /// configuration error rather than a per-request connection error.
    pub fn main_connection(&self) -> TenantResult<&S> {
        if !self.store.is_connected() {
            error!("control-plane connection is not connected");
            return Err(TenantError::configuration(
                "control-plane connection is not connected",
            ));
        }
        Ok(&self.store)
    }

    /// The store regardless of connection state.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn close(&self) -> TenantResult<()> {
        self.store.close().await?;
        info!("control-plane connection closed");
        Ok(())
    }
}

impl ControlPlane<PgControlStore> {
    /// Connect to the control database described by `config`.
    ///
    /// Failure here is fatal to startup.
    pub async fn connect(config: &ControlConfig) -> TenantResult<Self> {
        info!(url = %config.redacted_url(), "connecting to control database");
        let store = PgControlStore::connect(config).await?;
        info!("control-plane connection established");
        Ok(Self::new(store))
    }
}
