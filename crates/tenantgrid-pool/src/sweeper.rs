//! Idle eviction sweeper.
//!
//! A background task that wakes every `interval` and closes tenant pools
//! idle longer than `idle_threshold`. Stopped through its handle; a sweep
//! already in progress finishes before the task exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tenantgrid_control::ControlStore;

use crate::connector::PoolConnector;
use crate::registry::TenantPoolRegistry;

/// Handle to a running sweeper.
pub struct SweeperHandle {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "idle sweeper task ended abnormally");
        }
        info!("idle sweeper stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct IdleSweeper;

impl IdleSweeper {
    /// Spawn the sweep loop on the current runtime.
    pub fn spawn<S, C>(
        registry: Arc<TenantPoolRegistry<S, C>>,
        interval: Duration,
        idle_threshold: Duration,
    ) -> SweeperHandle
    where
        S: ControlStore,
        C: PoolConnector,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            run_sweep_loop(&registry, interval, idle_threshold, shutdown_rx).await;
        });
        info!(?interval, ?idle_threshold, "idle sweeper started");
        SweeperHandle {
            handle,
            shutdown_tx,
        }
    }
}

async fn run_sweep_loop<S, C>(
    registry: &TenantPoolRegistry<S, C>,
    interval: Duration,
    idle_threshold: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: ControlStore,
    C: PoolConnector,
{
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let report = registry.sweep_idle(idle_threshold).await;
                if report.evicted.is_empty() {
                    debug!(examined = report.examined, "idle sweep found nothing to evict");
                } else {
                    info!(
                        examined = report.examined,
                        evicted = report.evicted.len(),
                        close_failures = report.close_failures,
                        "idle sweep complete"
                    );
                }
            }
            _ = shutdown.changed() => {
                debug!("idle sweeper shutting down");
                break;
            }
        }
    }
}
