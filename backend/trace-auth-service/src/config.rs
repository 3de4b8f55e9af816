//! Configuration management for the trace-auth service
//!
//! Settings come from environment variables, with a `.env` file picked up
//! for local development.

use anyhow::{bail, Context, Result};
use crypto_core::{validate_secret_strength, SecretStrength};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub jwt: JwtSettings,
    pub trace: TraceSettings,
    pub identity: IdentitySettings,
}

impl Settings {
    /// Load `.env` (if present) and then read the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        Ok(Settings {
            server: ServerSettings::from_env()?,
            store: StoreSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            trace: TraceSettings::from_env()?,
            identity: IdentitySettings::from_env()?,
        })
    }
}

/// HTTP server bind settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("SERVER_PORT", "8080")?,
            workers: parse_var("SERVER_WORKERS", "4")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    /// Process-local maps; state is lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("unknown STORE_BACKEND '{other}', expected 'redis' or 'memory'"),
        }
    }
}

/// Credential and trace store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
    pub connection_timeout: Duration,
    pub response_timeout: Duration,
}

impl StoreSettings {
    fn from_env() -> Result<Self> {
        let backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .parse()?;

        let redis_url = env::var("REDIS_URL").ok();
        if backend == StoreBackend::Redis && redis_url.is_none() {
            bail!("REDIS_URL must be set when STORE_BACKEND=redis");
        }

        Ok(Self {
            backend,
            redis_url,
            connection_timeout: secs_var("REDIS_CONNECTION_TIMEOUT_SECS", "5")?,
            response_timeout: secs_var("REDIS_RESPONSE_TIMEOUT_SECS", "3")?,
        })
    }
}

/// Signing secret and credential lifetimes
#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        match validate_secret_strength(&secret) {
            SecretStrength::Weak => bail!(
                "JWT_SECRET is too weak: use at least 32 random bytes without repeated or sequential runs"
            ),
            SecretStrength::Acceptable => {
                warn!("JWT_SECRET is acceptable but shorter than the recommended 64 bytes")
            }
            SecretStrength::Strong => {}
        }

        let access_ttl = secs_var("ACCESS_TOKEN_TTL_SECS", "900")?;
        let refresh_ttl = secs_var("REFRESH_TOKEN_TTL_SECS", "604800")?;

        if access_ttl.is_zero() {
            bail!("ACCESS_TOKEN_TTL_SECS must be greater than zero");
        }
        if refresh_ttl <= access_ttl {
            bail!(
                "REFRESH_TOKEN_TTL_SECS ({}) must be greater than ACCESS_TOKEN_TTL_SECS ({})",
                refresh_ttl.as_secs(),
                access_ttl.as_secs()
            );
        }

        Ok(Self {
            secret,
            access_ttl,
            refresh_ttl,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub ttl: Duration,
}

impl TraceSettings {
    fn from_env() -> Result<Self> {
        let ttl = secs_var("TRACE_TTL_SECS", "300")?;
        if ttl.is_zero() {
            bail!("TRACE_TTL_SECS must be greater than zero");
        }
        Ok(Self { ttl })
    }
}

/// External identity service endpoint
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub base_url: String,
    pub verify_path: String,
    pub timeout: Duration,
}

impl IdentitySettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("IDENTITY_SERVICE_URL")
                .context("IDENTITY_SERVICE_URL must be set")?,
            verify_path: env::var("IDENTITY_VERIFY_PATH")
                .unwrap_or_else(|_| "/api/v1/users/verify".to_string()),
            timeout: secs_var("IDENTITY_SERVICE_TIMEOUT_SECS", "5")?,
        })
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid {name}"))
}

fn secs_var(name: &str, default: &str) -> Result<Duration> {
    parse_var::<u64>(name, default).map(Duration::from_secs)
}
