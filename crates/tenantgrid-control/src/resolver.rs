//! Credential resolver: tenant id to connection descriptor.
//!
//! ```text
//! tenant id
//!   → routing record (control DB, non-deleted)
//!   → tenant settings (control DB)
//!     → decrypt db_host / db_port / db_user / db_password with the master key
//!   → ConnectionDescriptor + pool sizing + transport flags
//! ```

use std::collections::BTreeSet;

use tracing::{debug, warn};

use tenantgrid_cipher::Cipher;
use tenantgrid_core::setting_keys::{DB_HOST, DB_PASSWORD, DB_PORT, DB_USER};
use tenantgrid_core::{
    ConnectionDescriptor, PoolSizing, TenantError, TenantGridConfig, TenantId, TenantResult,
    TenantRoutingRecord, TenantSetting, TransportOptions,
};

use crate::control_plane::ControlPlane;
use crate::store::ControlStore;

/// Resolves tenant routing and database credentials from the control plane.
///
/// Stateless apart from its configuration; safe to share across tasks.
pub struct CredentialResolver<S> {
    control: ControlPlane<S>,
    cipher: Cipher,
    sizing: PoolSizing,
    transport: TransportOptions,
}

impl<S: ControlStore> CredentialResolver<S> {
    pub fn new(
        control: ControlPlane<S>,
        cipher: Cipher,
        sizing: PoolSizing,
        transport: TransportOptions,
    ) -> Self {
        Self {
            control,
            cipher,
            sizing,
            transport,
        }
    }

    /// Build a resolver using the pool and transport sections of `config`.
    pub fn from_config(control: ControlPlane<S>, cipher: Cipher, config: &TenantGridConfig) -> Self {
        Self::new(
            control,
            cipher,
            config.pool.sizing(),
            config.transport.options(),
        )
    }

    pub fn control(&self) -> &ControlPlane<S> {
        &self.control
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    /// The non-deleted routing record for `id`.
    pub async fn resolve_tenant_routing(&self, id: TenantId) -> TenantResult<TenantRoutingRecord> {
        let store = self.control.main_connection()?;
        match store.tenant_by_id(id).await? {
            Some(record) if !record.is_deleted() => Ok(record),
            _ => Err(TenantError::not_found(format!("tenant {id}"))),
        }
    }

    /// The non-deleted routing record whose slug is `slug`.
    pub async fn resolve_tenant_routing_by_slug(
        &self,
        slug: &str,
    ) -> TenantResult<TenantRoutingRecord> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(TenantError::not_found("tenant with empty slug"));
        }
        let store = self.control.main_connection()?;
        match store.tenant_by_slug(slug).await? {
            Some(record) if !record.is_deleted() => Ok(record),
            _ => Err(TenantError::not_found(format!("tenant with slug {slug:?}"))),
        }
    }

    /// Assemble the descriptor for `id`'s database `database_name`.
    ///
    /// Fails without a partial result if any connection setting is missing,
    /// malformed, or cannot be decrypted.
    pub async fn resolve_tenant_db_config(
        &self,
        id: TenantId,
        database_name: &str,
    ) -> TenantResult<ConnectionDescriptor> {
        let store = self.control.main_connection()?;
        let settings = store.tenant_settings(id).await?;

        let host = self.required_value(id, &settings, DB_HOST)?;
        let port_raw = self.required_value(id, &settings, DB_PORT)?;
        let user = self.required_value(id, &settings, DB_USER)?;
        let password = self.required_value(id, &settings, DB_PASSWORD)?;

        let port = port_raw.trim().parse::<u16>().map_err(|_| {
            TenantError::configuration(format!(
                "tenant {id}: setting {DB_PORT} is not a valid port"
            ))
        })?;

        debug!(tenant_id = %id, %host, port, database = %database_name, "resolved tenant database config");

        Ok(ConnectionDescriptor {
            host,
            port,
            user,
            password,
            database: database_name.to_string(),
            pool: self.sizing,
            transport: self.transport,
        })
    }

    /// Tenants whose `key` setting decrypts to `expected`, sorted by id.
    ///
    /// A tenant whose value cannot be decrypted is logged and treated as not
    /// matching; the scan continues.
    pub async fn list_tenants_with_setting(
        &self,
        key: &str,
        expected: &str,
    ) -> TenantResult<Vec<TenantId>> {
        let store = self.control.main_connection()?;
        let settings = store.settings_with_key(key).await?;

        let mut matches = BTreeSet::new();
        for setting in settings {
            let value = if setting.is_encrypted {
                match self.cipher.decrypt(&setting.value) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(
                            tenant_id = %setting.tenant_id,
                            %key,
                            error = %e,
                            "skipping tenant: setting could not be decrypted"
                        );
                        continue;
                    }
                }
            } else {
                setting.value
            };
            if value == expected {
                matches.insert(setting.tenant_id);
            }
        }
        Ok(matches.into_iter().collect())
    }

    fn required_value(
        &self,
        id: TenantId,
        settings: &[TenantSetting],
        key: &str,
    ) -> TenantResult<String> {
        let setting = settings.iter().find(|s| s.key == key).ok_or_else(|| {
            TenantError::configuration(format!("tenant {id}: missing required setting {key}"))
        })?;

        let value = if setting.is_encrypted {
            self.cipher.decrypt(&setting.value).map_err(|e| {
                warn!(tenant_id = %id, %key, error = %e, "failed to decrypt tenant setting");
                TenantError::from(e)
            })?
        } else {
            setting.value.clone()
        };

        if value.is_empty() {
            return Err(TenantError::configuration(format!(
                "tenant {id}: required setting {key} is empty"
            )));
        }
        Ok(value)
    }
}
