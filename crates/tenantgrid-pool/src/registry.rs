//! Tenant pool registry.
//!
//! Keeps one live pool per tenant database, opened lazily on first use and
//! shared by every caller for that tenant. Creation is single-flight per
//! tenant: concurrent first requests share one creation and all receive its
//! outcome, failure included. Different tenants never block each other.
//!
//! Supports draining on shutdown: calling [`TenantPoolRegistry::shutdown`]
//! stops new pools from being cached and closes every cached pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{OnceCell, RwLock};
use tokio::time::Instant;

use tenantgrid_control::{ControlStore, CredentialResolver};
use tenantgrid_core::{TenantError, TenantId, TenantResult};

use crate::connector::{ManagedPool, PoolConnector};

/// A cached pool and its bookkeeping.
struct PooledConnection<P> {
    pool: P,
    database_name: String,
    /// Milliseconds since the registry epoch.
    created_at: u64,
    /// Milliseconds since the registry epoch; only ever moves forward.
    last_used: AtomicU64,
}

impl<P: ManagedPool> PooledConnection<P> {
    fn new(pool: P, database_name: String, now: u64) -> Self {
        Self {
            pool,
            database_name,
            created_at: now,
            last_used: AtomicU64::new(now),
        }
    }

    fn touch(&self, now: u64) {
        self.last_used.fetch_max(now, Ordering::AcqRel);
    }

    fn idle_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_used.load(Ordering::Acquire))
    }
}

/// Point-in-time view of one cached pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub tenant_id: TenantId,
    pub database_name: String,
    pub connected: bool,
    pub age: Duration,
    pub idle: Duration,
}

/// Outcome of one idle sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Entries looked at.
    pub examined: usize,
    /// Tenants whose pools were removed, whether or not close succeeded.
    pub evicted: Vec<TenantId>,
    pub close_failures: usize,
}

/// Outcome of draining the registry.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub closed: usize,
    pub failures: Vec<(TenantId, TenantError)>,
}

/// One in-progress creation, shared by every caller that joins it.
struct InFlight<P> {
    outcome: Arc<OnceCell<TenantResult<P>>>,
    /// Callers currently holding a [`CreationSlot`] on this creation.
    waiters: usize,
}

type InFlightMap<P> = Mutex<HashMap<TenantId, InFlight<P>>>;

fn lock_in_flight<P>(map: &InFlightMap<P>) -> MutexGuard<'_, HashMap<TenantId, InFlight<P>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A caller's membership in a tenant's in-flight creation.
///
/// Leaving (normally or by cancellation) drops the map entry once the
/// outcome is known or nobody else is waiting.
struct CreationSlot<'a, P> {
    map: &'a InFlightMap<P>,
    id: TenantId,
    outcome: Arc<OnceCell<TenantResult<P>>>,
}

impl<'a, P> CreationSlot<'a, P> {
    fn join(map: &'a InFlightMap<P>, id: TenantId) -> Self {
        let mut in_flight = lock_in_flight(map);
        let flight = in_flight.entry(id).or_insert_with(|| InFlight {
            outcome: Arc::new(OnceCell::new()),
            waiters: 0,
        });
        flight.waiters += 1;
        Self {
            map,
            id,
            outcome: Arc::clone(&flight.outcome),
        }
    }
}

impl<P> Drop for CreationSlot<'_, P> {
    fn drop(&mut self) {
        let mut in_flight = lock_in_flight(self.map);
        let Some(flight) = in_flight.get_mut(&self.id) else {
            return;
        };
        if !Arc::ptr_eq(&flight.outcome, &self.outcome) {
            return;
        }
        flight.waiters -= 1;
        if flight.waiters == 0 || flight.outcome.initialized() {
            in_flight.remove(&self.id);
        }
    }
}

pub struct TenantPoolRegistry<S, C: PoolConnector> {
    resolver: CredentialResolver<S>,
    connector: C,
    connect_timeout: Duration,
    pools: RwLock<HashMap<TenantId, Arc<PooledConnection<C::Pool>>>>,
    /// Per-tenant creations in progress. An entry exists only while some
    /// caller is waiting on that tenant's creation.
    creating: InFlightMap<C::Pool>,
    epoch: Instant,
    draining: AtomicBool,
}

impl<S: ControlStore, C: PoolConnector> TenantPoolRegistry<S, C> {
    pub fn new(resolver: CredentialResolver<S>, connector: C, connect_timeout: Duration) -> Self {
        Self {
            resolver,
            connector,
            connect_timeout,
            pools: RwLock::new(HashMap::new()),
            creating: Mutex::new(HashMap::new()),
            epoch: Instant::now(),
            draining: AtomicBool::new(false),
        }
    }

    pub fn resolver(&self) -> &CredentialResolver<S> {
        &self.resolver
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// The live pool for tenant `id`, creating it if needed.
    ///
    /// A cached pool that reports disconnected is closed and replaced.
    /// Concurrent callers for the same tenant share one creation attempt and
    /// its result. On failure nothing is cached, so the next call starts over.
    pub async fn get(&self, id: TenantId) -> TenantResult<C::Pool> {
        if let Some(pool) = self.live(id).await {
            return Ok(pool);
        }

        let slot = CreationSlot::join(&self.creating, id);
        slot.outcome
            .get_or_init(|| async {
                // A previous creation may have finished before this one began.
                match self.live(id).await {
                    Some(pool) => Ok(pool),
                    None => self.create(id).await,
                }
            })
            .await
            .clone()
    }

    /// Remove and close tenant `id`'s pool. Returns false if none was cached.
    pub async fn evict(&self, id: TenantId) -> TenantResult<bool> {
        let Some(entry) = self.pools.write().await.remove(&id) else {
            return Ok(false);
        };
        tracing::info!(tenant_id = %id, database = %entry.database_name, "evicting tenant pool");
        entry.pool.close().await?;
        Ok(true)
    }

    /// Close and remove every pool idle longer than `threshold`.
    ///
    /// Pools that report disconnected are removed as well. Entries are taken
    /// out under the write lock and closed after it is released, so a pool
    /// touched before the sweep takes the lock is never evicted.
    pub async fn sweep_idle(&self, threshold: Duration) -> SweepReport {
        let threshold_ms = duration_ms(threshold);
        let mut report = SweepReport::default();

        let expired: Vec<(TenantId, Arc<PooledConnection<C::Pool>>)> = {
            let mut pools = self.pools.write().await;
            let now = self.now_ms();
            report.examined = pools.len();
            let ids: Vec<TenantId> = pools
                .iter()
                .filter(|(_, entry)| {
                    entry.idle_ms(now) > threshold_ms || !entry.pool.is_connected()
                })
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pools.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (id, entry) in expired {
            match entry.pool.close().await {
                Ok(()) => tracing::info!(
                    tenant_id = %id,
                    database = %entry.database_name,
                    "evicted idle tenant pool"
                ),
                Err(e) => {
                    report.close_failures += 1;
                    tracing::warn!(
                        tenant_id = %id,
                        error = %e,
                        "failed to close idle tenant pool"
                    );
                }
            }
            report.evicted.push(id);
        }

        report
    }

    /// Stop caching new pools and close every cached one.
    ///
    /// Close failures are collected, not short-circuited.
    pub async fn shutdown(&self) -> DrainReport {
        self.draining.store(true, Ordering::Release);
        let drained: Vec<_> = self.pools.write().await.drain().collect();
        tracing::info!(pools = drained.len(), "tenant pool registry draining");

        let mut report = DrainReport::default();
        for (id, entry) in drained {
            match entry.pool.close().await {
                Ok(()) => report.closed += 1,
                Err(e) => {
                    tracing::warn!(tenant_id = %id, error = %e, "failed to close tenant pool");
                    report.failures.push((id, e));
                }
            }
        }
        report
    }

    /// Cached tenant ids, ascending.
    pub async fn cached_tenants(&self) -> Vec<TenantId> {
        let mut ids: Vec<TenantId> = self.pools.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn entry_info(&self, id: TenantId) -> Option<EntryInfo> {
        let pools = self.pools.read().await;
        let entry = pools.get(&id)?;
        let now = self.now_ms();
        Some(EntryInfo {
            tenant_id: id,
            database_name: entry.database_name.clone(),
            connected: entry.pool.is_connected(),
            age: Duration::from_millis(now.saturating_sub(entry.created_at)),
            idle: Duration::from_millis(entry.idle_ms(now)),
        })
    }

    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }

    /// Fast path: a cached, connected pool, touched.
    async fn live(&self, id: TenantId) -> Option<C::Pool> {
        let pools = self.pools.read().await;
        let entry = pools.get(&id)?;
        if !entry.pool.is_connected() {
            return None;
        }
        entry.touch(self.now_ms());
        Some(entry.pool.clone())
    }

    /// Resolve credentials and open a pool. Runs once per in-flight creation.
    async fn create(&self, id: TenantId) -> TenantResult<C::Pool> {
        if self.is_draining() {
            return Err(TenantError::connection(
                "tenant pool registry is draining; no new pools accepted",
            ));
        }

        self.discard_dead(id).await;

        let record = self.resolver.resolve_tenant_routing(id).await?;
        let descriptor = self
            .resolver
            .resolve_tenant_db_config(id, &record.database_name)
            .await?;

        let pool = match tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(&descriptor),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(TenantError::connection(format!(
                    "opening pool for tenant {id} timed out after {:?}",
                    self.connect_timeout
                )));
            }
        };

        let mut pools = self.pools.write().await;
        if self.is_draining() {
            drop(pools);
            // Best-effort: the caller gets the draining error either way.
            let _ = pool.close().await;
            return Err(TenantError::connection(
                "tenant pool registry is draining; no new pools accepted",
            ));
        }
        let entry = PooledConnection::new(pool.clone(), record.database_name, self.now_ms());
        tracing::info!(
            tenant_id = %id,
            database = %entry.database_name,
            host = %descriptor.host,
            "opened tenant pool"
        );
        pools.insert(id, Arc::new(entry));
        Ok(pool)
    }

    /// Drop a cached entry whose pool is no longer connected.
    async fn discard_dead(&self, id: TenantId) {
        let stale = {
            let mut pools = self.pools.write().await;
            match pools.get(&id) {
                Some(entry) if !entry.pool.is_connected() => pools.remove(&id),
                _ => None,
            }
        };
        if let Some(entry) = stale {
            tracing::warn!(tenant_id = %id, "cached tenant pool is disconnected; replacing");
            if let Err(e) = entry.pool.close().await {
                tracing::debug!(tenant_id = %id, error = %e, "closing dead pool failed");
            }
        }
    }

    fn now_ms(&self) -> u64 {
        duration_ms(self.epoch.elapsed())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<S, C: PoolConnector> std::fmt::Debug for TenantPoolRegistry<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantPoolRegistry")
            .field("connect_timeout", &self.connect_timeout)
            .field("draining", &self.draining.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tenantgrid_cipher::{Cipher, CipherFormat, MasterKey};
    use tenantgrid_control::{ControlPlane, MemoryControlStore};
    use tenantgrid_core::setting_keys::{DB_HOST, DB_PASSWORD, DB_PORT, DB_USER};
    use tenantgrid_core::{
        ConnectionDescriptor, PoolSizing, TenantRoutingRecord, TenantSetting, TransportOptions,
    };

    const KEY: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0";

    // ── Test doubles ─────────────────────────────────────────────────

    #[derive(Clone, Debug)]
    struct MockPool {
        database: String,
        connected: Arc<AtomicBool>,
        fail_close: bool,
    }

    #[async_trait]
    impl ManagedPool for MockPool {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn close(&self) -> TenantResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            if self.fail_close {
                return Err(TenantError::connection("close failed"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockConnector {
        connect_count: AtomicUsize,
        fail: AtomicBool,
        fail_close: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl PoolConnector for MockConnector {
        type Pool = MockPool;

        async fn connect(&self, descriptor: &ConnectionDescriptor) -> TenantResult<MockPool> {
            self.connect_count.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(TenantError::connection("connection refused"));
            }
            Ok(MockPool {
                database: descriptor.database.clone(),
                connected: Arc::new(AtomicBool::new(true)),
                fail_close: self.fail_close,
            })
        }
    }

    fn cipher() -> Cipher {
        Cipher::new(MasterKey::from_hex(KEY).unwrap(), CipherFormat::Versioned)
    }

    fn seed_tenant(store: &MemoryControlStore, id: i64) {
        store.insert_tenant(TenantRoutingRecord {
            id: TenantId(id),
            name: format!("Tenant {id}"),
            database_name: format!("tenant_{id}"),
            slug: None,
            deleted_at: None,
        });
        for (key, value) in [
            (DB_HOST, "db.internal"),
            (DB_PORT, "5432"),
            (DB_USER, "app"),
            (DB_PASSWORD, "s3cret"),
        ] {
            store.put_setting(TenantSetting {
                tenant_id: TenantId(id),
                key: key.into(),
                value: cipher().encrypt(value).unwrap(),
                is_encrypted: true,
            });
        }
    }

    fn registry_with(connector: MockConnector) -> TenantPoolRegistry<MemoryControlStore, MockConnector> {
        let store = MemoryControlStore::new();
        seed_tenant(&store, 7);
        seed_tenant(&store, 8);
        let resolver = CredentialResolver::new(
            ControlPlane::new(store),
            cipher(),
            PoolSizing::default(),
            TransportOptions::default(),
        );
        TenantPoolRegistry::new(resolver, connector, Duration::from_secs(15))
    }

    fn registry() -> TenantPoolRegistry<MemoryControlStore, MockConnector> {
        registry_with(MockConnector::default())
    }

    fn connects(r: &TenantPoolRegistry<MemoryControlStore, MockConnector>) -> usize {
        r.connector.connect_count.load(Ordering::SeqCst)
    }

    // ── Lookup and caching ───────────────────────────────────────────

    #[tokio::test]
    async fn first_get_creates_and_second_reuses() {
        let r = registry();
        let a = r.get(TenantId(7)).await.unwrap();
        let b = r.get(TenantId(7)).await.unwrap();
        assert_eq!(a.database, "tenant_7");
        assert!(Arc::ptr_eq(&a.connected, &b.connected));
        assert_eq!(connects(&r), 1);
        assert_eq!(r.len().await, 1);
    }

    #[tokio::test]
    async fn tenants_get_separate_pools() {
        let r = registry();
        let a = r.get(TenantId(7)).await.unwrap();
        let b = r.get(TenantId(8)).await.unwrap();
        assert_eq!(b.database, "tenant_8");
        assert!(!Arc::ptr_eq(&a.connected, &b.connected));
        assert_eq!(r.cached_tenants().await, vec![TenantId(7), TenantId(8)]);
    }

    #[tokio::test]
    async fn dead_pool_is_replaced() {
        let r = registry();
        let first = r.get(TenantId(7)).await.unwrap();
        first.connected.store(false, Ordering::SeqCst);

        let second = r.get(TenantId(7)).await.unwrap();
        assert!(second.is_connected());
        assert!(!Arc::ptr_eq(&first.connected, &second.connected));
        assert_eq!(connects(&r), 2);
        assert_eq!(r.len().await, 1);
    }

    #[tokio::test]
    async fn connect_failure_caches_nothing() {
        let r = registry();
        r.connector.fail.store(true, Ordering::SeqCst);
        let err = r.get(TenantId(7)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(r.is_empty().await);

        r.connector.fail.store(false, Ordering::SeqCst);
        assert!(r.get(TenantId(7)).await.is_ok());
        assert_eq!(connects(&r), 2);
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found_and_not_cached() {
        let r = registry();
        let err = r.get(TenantId(99)).await.unwrap_err();
        assert!(matches!(err, TenantError::NotFound(_)));
        assert!(r.is_empty().await);
        assert_eq!(connects(&r), 0);
        assert!(r.creating.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_never_reach_connector() {
        let r = registry();
        let store = r.resolver().control().store();
        store.remove_setting(TenantId(7), DB_PASSWORD);
        let err = r.get(TenantId(7)).await.unwrap_err();
        assert!(matches!(err, TenantError::Configuration(_)));
        assert_eq!(connects(&r), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connect_times_out() {
        let r = registry_with(MockConnector {
            delay: Some(Duration::from_secs(60)),
            ..MockConnector::default()
        });
        let err = r.get(TenantId(7)).await.unwrap_err();
        assert!(matches!(err, TenantError::Connection(_)));
        assert!(r.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_gets_create_once() {
        let r = Arc::new(registry_with(MockConnector {
            delay: Some(Duration::from_millis(50)),
            ..MockConnector::default()
        }));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let r = Arc::clone(&r);
                tokio::spawn(async move { r.get(TenantId(7)).await })
            })
            .collect();

        let mut pools = Vec::new();
        for h in handles {
            pools.push(h.await.unwrap().unwrap());
        }
        assert_eq!(connects(&r), 1);
        assert!(pools.iter().all(|p| Arc::ptr_eq(&p.connected, &pools[0].connected)));
        assert!(r.creating.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_creation_is_shared_with_waiters() {
        let r = Arc::new(registry_with(MockConnector {
            fail: AtomicBool::new(true),
            delay: Some(Duration::from_secs(10)),
            ..MockConnector::default()
        }));
        let started = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&r);
                tokio::spawn(async move { r.get(TenantId(7)).await })
            })
            .collect();

        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(matches!(err, TenantError::Connection(_)));
        }
        assert_eq!(connects(&r), 1);
        assert!(started.elapsed() < Duration::from_secs(15));
        assert!(r.is_empty().await);
        assert!(r.creating.lock().unwrap().is_empty());

        r.connector.fail.store(false, Ordering::SeqCst);
        assert!(r.get(TenantId(7)).await.is_ok());
        assert_eq!(connects(&r), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_get_releases_creation() {
        let r = registry_with(MockConnector {
            delay: Some(Duration::from_secs(60)),
            ..MockConnector::default()
        });
        let cancelled = tokio::time::timeout(Duration::from_secs(1), r.get(TenantId(7))).await;
        assert!(cancelled.is_err());
        assert!(r.creating.lock().unwrap().is_empty());

        // A later caller starts its own attempt rather than waiting on the dropped one.
        let err = r.get(TenantId(7)).await.unwrap_err();
        assert!(matches!(err, TenantError::Connection(_)));
        assert_eq!(connects(&r), 2);
        assert!(r.creating.lock().unwrap().is_empty());
    }

    // ── Eviction ─────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_idle_pools() {
        let r = registry();
        let idle = r.get(TenantId(7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        let busy = r.get(TenantId(8)).await.unwrap();
        tokio::time::advance(Duration::from_secs(11 * 60)).await;

        let report = r.sweep_idle(Duration::from_secs(30 * 60)).await;
        assert_eq!(report.examined, 2);
        assert_eq!(report.evicted, vec![TenantId(7)]);
        assert_eq!(report.close_failures, 0);
        assert!(!idle.is_connected());
        assert!(busy.is_connected());
        assert_eq!(r.cached_tenants().await, vec![TenantId(8)]);
    }

    #[tokio::test(start_paused = true)]
    async fn recent_touch_protects_from_sweep() {
        let r = registry();
        r.get(TenantId(7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30 * 60 - 1)).await;
        r.get(TenantId(7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;

        let report = r.sweep_idle(Duration::from_secs(30 * 60)).await;
        assert!(report.evicted.is_empty());
        let info = r.entry_info(TenantId(7)).await.unwrap();
        assert_eq!(info.idle, Duration::from_secs(1));
        assert_eq!(info.age, Duration::from_secs(30 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_tenant_is_recreated_on_demand() {
        let r = registry();
        r.get(TenantId(7)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        r.sweep_idle(Duration::from_secs(30 * 60)).await;
        assert!(r.is_empty().await);

        assert!(r.get(TenantId(7)).await.unwrap().is_connected());
        assert_eq!(connects(&r), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_counts_close_failures_and_still_evicts() {
        let r = registry_with(MockConnector {
            fail_close: true,
            ..MockConnector::default()
        });
        r.get(TenantId(7)).await.unwrap();
        r.get(TenantId(8)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31 * 60)).await;

        let report = r.sweep_idle(Duration::from_secs(30 * 60)).await;
        assert_eq!(report.evicted.len(), 2);
        assert_eq!(report.close_failures, 2);
        assert!(r.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_removes_disconnected_pools() {
        let r = registry();
        let pool = r.get(TenantId(7)).await.unwrap();
        pool.connected.store(false, Ordering::SeqCst);
        let report = r.sweep_idle(Duration::from_secs(3600)).await;
        assert_eq!(report.evicted, vec![TenantId(7)]);
    }

    #[tokio::test]
    async fn explicit_evict() {
        let r = registry();
        let pool = r.get(TenantId(7)).await.unwrap();
        assert!(r.evict(TenantId(7)).await.unwrap());
        assert!(!pool.is_connected());
        assert!(!r.evict(TenantId(7)).await.unwrap());
    }

    // ── Draining ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn shutdown_closes_everything_and_rejects_new_pools() {
        let r = registry();
        let a = r.get(TenantId(7)).await.unwrap();
        let b = r.get(TenantId(8)).await.unwrap();

        let report = r.shutdown().await;
        assert_eq!(report.closed, 2);
        assert!(report.failures.is_empty());
        assert!(!a.is_connected() && !b.is_connected());
        assert!(r.is_draining());

        let err = r.get(TenantId(7)).await.unwrap_err();
        assert!(err.to_string().contains("draining"));
        assert!(r.is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_collects_close_failures() {
        let r = registry_with(MockConnector {
            fail_close: true,
            ..MockConnector::default()
        });
        r.get(TenantId(7)).await.unwrap();
        let report = r.shutdown().await;
        assert_eq!(report.closed, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, TenantId(7));
    }
}
