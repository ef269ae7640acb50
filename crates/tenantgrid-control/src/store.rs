//! The control-database access seam.

use async_trait::async_trait;

use tenantgrid_core::{TenantId, TenantResult, TenantRoutingRecord, TenantSetting};

/// Read-only queries against the shared control database.
///
/// Implementations return only rows without a soft-delete marker. Query
/// failures surface as [`tenantgrid_core::TenantError::Connection`].
#[async_trait]
pub trait ControlStore: Send + Sync + 'static {
    /// The routing record for `id`, if one exists.
    async fn tenant_by_id(&self, id: TenantId) -> TenantResult<Option<TenantRoutingRecord>>;

    /// The routing record whose slug is `slug`, if one exists.
    async fn tenant_by_slug(&self, slug: &str) -> TenantResult<Option<TenantRoutingRecord>>;

    /// Every setting row belonging to `id`.
    async fn tenant_settings(&self, id: TenantId) -> TenantResult<Vec<TenantSetting>>;

    /// Every setting row named `key`, across all live tenants.
    async fn settings_with_key(&self, key: &str) -> TenantResult<Vec<TenantSetting>>;

    /// Whether the underlying connection is usable.
    fn is_connected(&self) -> bool;

    /// Close the underlying connection.
    async fn close(&self) -> TenantResult<()>;
}
