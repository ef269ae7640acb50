//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, bail};
use tracing::{info, warn};

use tenantgrid_cipher::{Cipher, CipherFormat, MasterKey};
use tenantgrid_core::{TenantGridConfig, TenantId};
use tenantgrid_pool::PgTenantConnections;

pub async fn serve(config_path: &Path) -> anyhow::Result<()> {
    let connections = bootstrap(config_path).await?;
    info!("tenantgridd serving; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl-C handler")?;
    info!("shutdown signal received");

    let report = connections.shutdown().await;
    if !report.is_clean() {
        bail!("shutdown finished with errors: {report}");
    }
    info!(%report, "tenantgridd stopped");
    Ok(())
}

pub fn init(path: &Path, control_url: &str, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = TenantGridConfig::scaffold(control_url);
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn keygen() -> anyhow::Result<String> {
    Ok(MasterKey::generate()?.to_hex())
}

pub fn encrypt_value(key: MasterKey, format: &str, plaintext: &str) -> anyhow::Result<String> {
    let format: CipherFormat = format.parse().map_err(anyhow::Error::msg)?;
    if format == CipherFormat::Legacy {
        warn!("legacy format uses a fixed IV; equal plaintexts produce equal ciphertexts");
    }
    Ok(Cipher::new(key, format).encrypt(plaintext)?)
}

/// Either stored format decodes, so the cipher's write format is irrelevant here.
pub fn decrypt_value(key: MasterKey, ciphertext: &str) -> anyhow::Result<String> {
    Ok(Cipher::new(key, CipherFormat::default()).decrypt(ciphertext)?)
}

pub async fn check_tenant(config_path: &Path, id: TenantId, json: bool) -> anyhow::Result<()> {
    let connections = bootstrap(config_path).await?;

    let outcome = connections.tenant_connection(id).await;
    let info = connections.registry().entry_info(id).await;
    let report = connections.shutdown().await;
    if !report.is_clean() {
        warn!(%report, "shutdown after check finished with errors");
    }

    outcome.with_context(|| format!("tenant {id}"))?;
    let Some(info) = info else {
        bail!("tenant {id}: pool opened but was not cached");
    };

    if json {
        let out = serde_json::json!({
            "tenant_id": id,
            "database": info.database_name,
            "connected": info.connected,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("tenant {id}: database {} reachable", info.database_name);
    }
    Ok(())
}

async fn bootstrap(config_path: &Path) -> anyhow::Result<PgTenantConnections> {
    let config = TenantGridConfig::load(Some(config_path))
        .with_context(|| format!("loading {}", config_path.display()))?;
    let key = MasterKey::from_env()?;
    let cipher = config.cipher(key)?;
    Ok(PgTenantConnections::connect(&config, cipher).await?)
}
