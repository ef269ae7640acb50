//! tenantgrid.toml configuration parser.
//!
//! The file covers everything except the master key, which is read from the
//! environment only (see [`tenantgrid_cipher::MasterKey::from_env`]). A few
//! deployment-specific values can be overridden through environment
//! variables so the same file works across environments.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantgrid_cipher::{Cipher, CipherFormat, MasterKey};

use crate::error::{TenantError, TenantResult};
use crate::types::{PoolSizing, TransportOptions};

/// Overrides `[control] url`.
pub const ENV_CONTROL_URL: &str = "TENANTGRID_CONTROL_URL";
/// Overrides `[transport] encrypt`.
pub const ENV_DB_ENCRYPT: &str = "TENANTGRID_DB_ENCRYPT";
/// Overrides `[transport] trust_server_certificate`.
pub const ENV_DB_TRUST_SERVER_CERTIFICATE: &str = "TENANTGRID_DB_TRUST_SERVER_CERTIFICATE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantGridConfig {
    pub control: ControlConfig,
    pub pool: PoolConfig,
    pub sweeper: SweeperConfig,
    pub transport: TransportConfig,
    pub cipher: CipherConfig,
}

/// Connection to the shared control database.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(with = "duration_str")]
    pub connect_timeout: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ControlConfig {
    /// The URL with any password replaced, for logging.
    pub fn redacted_url(&self) -> String {
        redact_url(&self.url)
    }
}

impl fmt::Debug for ControlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlConfig")
            .field("url", &self.redacted_url())
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Sizing for tenant pools plus the registry's connect deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    #[serde(with = "duration_str")]
    pub idle_timeout: Duration,
    #[serde(with = "duration_str")]
    pub acquire_timeout: Duration,
    /// Upper bound on opening a new tenant pool.
    #[serde(with = "duration_str")]
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let sizing = PoolSizing::default();
        Self {
            max_connections: sizing.max_connections,
            min_connections: sizing.min_connections,
            idle_timeout: sizing.idle_timeout,
            acquire_timeout: sizing.acquire_timeout,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl PoolConfig {
    pub fn sizing(&self) -> PoolSizing {
        PoolSizing {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            idle_timeout: self.idle_timeout,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

/// Idle eviction of cached tenant pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    #[serde(with = "duration_str")]
    pub interval: Duration,
    #[serde(with = "duration_str")]
    pub idle_threshold: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10 * 60),
            idle_threshold: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub encrypt: bool,
    pub trust_server_certificate: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let opts = TransportOptions::default();
        Self {
            encrypt: opts.encrypt,
            trust_server_certificate: opts.trust_server_certificate,
        }
    }
}

impl TransportConfig {
    pub fn options(&self) -> TransportOptions {
        TransportOptions {
            encrypt: self.encrypt,
            trust_server_certificate: self.trust_server_certificate,
        }
    }
}

/// Ciphertext format for newly written values.
///
/// `"legacy"` writes the fixed-IV format so existing readers keep working;
/// it reveals which stored values are equal. `"versioned"` (default) writes
/// a random IV. Both are always readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub format: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            format: CipherFormat::default().to_string(),
        }
    }
}

impl TenantGridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: TenantGridConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from `path` (or defaults), apply process environment overrides, validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_CONTROL_URL).filter(|v| !v.trim().is_empty()) {
            self.control.url = url;
        }
        if let Some(v) = lookup(ENV_DB_ENCRYPT) {
            self.transport.encrypt = parse_bool(&v);
        }
        if let Some(v) = lookup(ENV_DB_TRUST_SERVER_CERTIFICATE) {
            self.transport.trust_server_certificate = parse_bool(&v);
        }
    }

    pub fn validate(&self) -> TenantResult<()> {
        if self.control.url.trim().is_empty() {
            return Err(TenantError::configuration(format!(
                "control database url is not set ([control] url or {ENV_CONTROL_URL})"
            )));
        }
        if self.control.max_connections == 0 {
            return Err(TenantError::configuration(
                "[control] max_connections must be at least 1",
            ));
        }
        if self.pool.max_connections == 0 {
            return Err(TenantError::configuration(
                "[pool] max_connections must be at least 1",
            ));
        }
        if self.pool.min_connections > self.pool.max_connections {
            return Err(TenantError::configuration(format!(
                "[pool] min_connections ({}) exceeds max_connections ({})",
                self.pool.min_connections, self.pool.max_connections
            )));
        }
        if self.sweeper.enabled
            && (self.sweeper.interval.is_zero() || self.sweeper.idle_threshold.is_zero())
        {
            return Err(TenantError::configuration(
                "[sweeper] interval and idle_threshold must be non-zero",
            ));
        }
        self.cipher_format()?;
        Ok(())
    }

    pub fn cipher_format(&self) -> TenantResult<CipherFormat> {
        self.cipher
            .format
            .parse()
            .map_err(|e: String| TenantError::configuration(format!("[cipher] {e}")))
    }

    /// Bind `key` to the configured format.
    pub fn cipher(&self, key: MasterKey) -> TenantResult<Cipher> {
        let format = self.cipher_format()?;
        if format == CipherFormat::Legacy {
            tracing::warn!("cipher format is legacy: new values use a fixed IV");
        }
        Ok(Cipher::new(key, format))
    }

    /// Scaffold a config with a placeholder control URL.
    pub fn scaffold(control_url: &str) -> Self {
        TenantGridConfig {
            control: ControlConfig {
                url: control_url.to_string(),
                ..ControlConfig::default()
            },
            ..TenantGridConfig::default()
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.find(':') {
        Some(colon) => format!(
            "{}://{}:****@{}",
            &url[..scheme_end],
            &userinfo[..colon],
            &rest[at + 1..]
        ),
        None => url.to_string(),
    }
}

/// Parse `"250ms"`, `"30s"`, `"10m"`, `"1h"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.trim().parse::<u64>().ok()?.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Inverse of [`parse_duration`], choosing the largest exact unit.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 {
        return format!("{}ms", d.as_millis());
    }
    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid duration: {raw}")))
    }
}
