//! Application configuration
//!
//! Read from TOML. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use aroma_net::{ClientConfig, ReadScope};

use crate::error::{Error, Result};

const STORE_FILE: &str = "aroma.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the remote REST service
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Inactivity budget before the session expires
    pub idle_timeout_secs: u64,
    /// Default lifetime of a notification; 0 keeps it until dismissed
    pub notification_ttl_ms: u64,
    /// Read the catalog from the unauthenticated endpoints
    pub public_reads: bool,
    /// Local store file; the platform data directory when unset
    pub store_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: aroma_net::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: aroma_net::DEFAULT_TIMEOUT.as_secs(),
            idle_timeout_secs: 30 * 60,
            notification_ttl_ms: 5_000,
            public_reads: true,
            store_path: None,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let base = self.api_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api_base_url must be an http(s) URL, got \"{}\"",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if self.idle_timeout_secs == 0 {
            return Err(Error::Config("idle_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    /// Settings for the HTTP client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.trim().to_string(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            read_scope: if self.public_reads {
                ReadScope::Public
            } else {
                ReadScope::Admin
            },
        }
    }

    /// Where the local store lives
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("dev", "aroma", "aroma")
            .ok_or_else(|| Error::Config("Could not determine data directory".into()))?;
        Ok(dirs.data_dir().join(STORE_FILE))
    }
}
