//! In-memory control store for tests and local development.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use tenantgrid_core::{TenantId, TenantResult, TenantRoutingRecord, TenantSetting};

use crate::store::ControlStore;

#[derive(Default)]
struct Tables {
    tenants: BTreeMap<TenantId, TenantRoutingRecord>,
    /// Keyed by `(tenant_id, key)`.
    settings: BTreeMap<(TenantId, String), TenantSetting>,
}

/// A [`ControlStore`] holding its tables in memory.
///
/// Soft-deleted tenants are stored but never returned, matching the
/// database-backed store.
pub struct MemoryControlStore {
    tables: RwLock<Tables>,
    connected: AtomicBool,
    queries: AtomicU64,
}

impl Default for MemoryControlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryControlStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            connected: AtomicBool::new(true),
            queries: AtomicU64::new(0),
        }
    }

    /// Insert or replace a routing record.
    pub fn insert_tenant(&self, record: TenantRoutingRecord) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.tenants.insert(record.id, record);
    }

    /// Insert or replace the setting `(tenant_id, key)`.
    pub fn put_setting(&self, setting: TenantSetting) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .settings
            .insert((setting.tenant_id, setting.key.clone()), setting);
    }

    /// Remove a setting. Returns true if it existed.
    pub fn remove_setting(&self, tenant_id: TenantId, key: &str) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .settings
            .remove(&(tenant_id, key.to_string()))
            .is_some()
    }

    /// Mark a tenant deleted at `at` (epoch seconds). Returns true if it existed.
    pub fn soft_delete_tenant(&self, id: TenantId, at: u64) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        match tables.tenants.get_mut(&id) {
            Some(record) => {
                record.deleted_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// Simulate the control connection dropping or recovering.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    fn live_tenant(tables: &Tables, id: TenantId) -> Option<&TenantRoutingRecord> {
        tables.tenants.get(&id).filter(|r| !r.is_deleted())
    }

    fn count_query(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlStore for MemoryControlStore {
    async fn tenant_by_id(&self, id: TenantId) -> TenantResult<Option<TenantRoutingRecord>> {
        self.count_query();
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::live_tenant(&tables, id).cloned())
    }

    async fn tenant_by_slug(&self, slug: &str) -> TenantResult<Option<TenantRoutingRecord>> {
        self.count_query();
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .tenants
            .values()
            .find(|r| !r.is_deleted() && r.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn tenant_settings(&self, id: TenantId) -> TenantResult<Vec<TenantSetting>> {
        self.count_query();
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .settings
            .values()
            .filter(|s| s.tenant_id == id)
            .cloned()
            .collect())
    }

    async fn settings_with_key(&self, key: &str) -> TenantResult<Vec<TenantSetting>> {
        self.count_query();
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .settings
            .values()
            .filter(|s| s.key == key && Self::live_tenant(&tables, s.tenant_id).is_some())
            .cloned()
            .collect())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> TenantResult<()> {
        self.set_connected(false);
        Ok(())
    }
}
