//! Postgres-backed control store.
//!
//! Expected layout:
//!
//! ```text
//! tenants          (id BIGINT PK, name TEXT, database_name TEXT,
//!                   slug TEXT UNIQUE NULL, deleted_at TIMESTAMPTZ NULL)
//! tenant_settings  (tenant_id BIGINT, key TEXT, value TEXT,
//!                   is_encrypted BOOLEAN, deleted_at TIMESTAMPTZ NULL,
//!                   UNIQUE (tenant_id, key))
//! ```

use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use tenantgrid_core::config::ControlConfig;
use tenantgrid_core::{TenantError, TenantId, TenantResult, TenantRoutingRecord, TenantSetting};

use crate::store::ControlStore;

const TENANT_BY_ID: &str = "SELECT id, name, database_name, slug FROM tenants \
     WHERE id = $1 AND deleted_at IS NULL";

const TENANT_BY_SLUG: &str = "SELECT id, name, database_name, slug FROM tenants \
     WHERE slug = $1 AND deleted_at IS NULL";

const SETTINGS_FOR_TENANT: &str = "SELECT tenant_id, key, value, is_encrypted FROM tenant_settings \
     WHERE tenant_id = $1 AND deleted_at IS NULL";

const SETTINGS_WITH_KEY: &str = "SELECT s.tenant_id, s.key, s.value, s.is_encrypted \
     FROM tenant_settings s JOIN tenants t ON t.id = s.tenant_id \
     WHERE s.key = $1 AND s.deleted_at IS NULL AND t.deleted_at IS NULL \
     ORDER BY s.tenant_id";

#[derive(FromRow)]
struct TenantRow {
    id: i64,
    name: String,
    database_name: String,
    slug: Option<String>,
}

impl From<TenantRow> for TenantRoutingRecord {
    fn from(row: TenantRow) -> Self {
        TenantRoutingRecord {
            id: TenantId(row.id),
            name: row.name,
            database_name: row.database_name,
            slug: row.slug,
            deleted_at: None,
        }
    }
}

#[derive(FromRow)]
struct SettingRow {
    tenant_id: i64,
    key: String,
    value: String,
    is_encrypted: bool,
}

impl From<SettingRow> for TenantSetting {
    fn from(row: SettingRow) -> Self {
        TenantSetting {
            tenant_id: TenantId(row.tenant_id),
            key: row.key,
            value: row.value,
            is_encrypted: row.is_encrypted,
        }
    }
}

/// Control store over a sqlx Postgres pool.
#[derive(Clone, Debug)]
pub struct PgControlStore {
    pool: PgPool,
}

impl PgControlStore {
    /// Open the control pool and verify it can connect.
    pub async fn connect(config: &ControlConfig) -> TenantResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(TenantError::connection)?;
        debug!(url = %config.redacted_url(), "control pool opened");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The raw pool, for modules that query the control database directly.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ControlStore for PgControlStore {
    async fn tenant_by_id(&self, id: TenantId) -> TenantResult<Option<TenantRoutingRecord>> {
        let row = sqlx::query_as::<_, TenantRow>(TENANT_BY_ID)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(TenantError::connection)?;
        Ok(row.map(Into::into))
    }

    async fn tenant_by_slug(&self, slug: &str) -> TenantResult<Option<TenantRoutingRecord>> {
        let row = sqlx::query_as::<_, TenantRow>(TENANT_BY_SLUG)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(TenantError::connection)?;
        Ok(row.map(Into::into))
    }

    async fn tenant_settings(&self, id: TenantId) -> TenantResult<Vec<TenantSetting>> {
        let rows = sqlx::query_as::<_, SettingRow>(SETTINGS_FOR_TENANT)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(TenantError::connection)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn settings_with_key(&self, key: &str) -> TenantResult<Vec<TenantSetting>> {
        let rows = sqlx::query_as::<_, SettingRow>(SETTINGS_WITH_KEY)
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(TenantError::connection)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(&self) -> TenantResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
