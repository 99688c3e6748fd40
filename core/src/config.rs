//! Connection settings for an `AutoskopeApi` session.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "https://portal.autoskope.de";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub const ENV_HOST: &str = "AUTOSKOPE_HOST";
pub const ENV_USERNAME: &str = "AUTOSKOPE_USERNAME";
pub const ENV_PASSWORD: &str = "AUTOSKOPE_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "AUTOSKOPE_TIMEOUT_SECS";

/// Host, credentials, and the per-request timeout.
#[derive(Clone)]
pub struct ClientConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Validate `host` and build a config with the default timeout.
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self, ConfigError> {
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ConfigError::InvalidHost(host.to_string()));
        }
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read settings from `AUTOSKOPE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(ENV_HOST)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let username = lookup(ENV_USERNAME)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingVar(ENV_USERNAME))?;
        let password = lookup(ENV_PASSWORD)
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingVar(ENV_PASSWORD))?;

        let mut config = Self::new(host.trim(), &username, &password)?;
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
