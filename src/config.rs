use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PortalError;

// Default configuration values
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STORAGE_FILE: &str = "portal-credential.json";

/// Configuration for the portal client.
///
/// The base URL and the fixed service credentials used by the token-issuance
/// endpoint are static deployment configuration, not per-user secrets. The
/// embedding application usually builds this once at startup via
/// [`PortalConfig::from_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub base_url: String,
    /// Service client id exchanged for a bearer credential.
    pub client_id: String,
    /// Service client secret exchanged for a bearer credential.
    pub client_secret: String,
    /// Upper bound for every outgoing request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where the bearer credential is persisted between runs.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
}

impl PortalConfig {
    /// Create a configuration with default timeout and storage path.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            request_timeout_secs: default_timeout_secs(),
            storage_path: default_storage_path(),
        }
    }

    /// Build the configuration from environment variables.
    ///
    /// Reads `PORTAL_BASE_URL`, `PORTAL_CLIENT_ID` and `PORTAL_CLIENT_SECRET`
    /// (all required), plus optional `PORTAL_TIMEOUT_SECS` and
    /// `PORTAL_STORAGE_PATH`. A `.env` file is honored when present.
    pub fn from_env() -> Result<Self, PortalError> {
        dotenvy::dotenv().ok();

        let mut config = Self::new(
            required_env("PORTAL_BASE_URL")?,
            required_env("PORTAL_CLIENT_ID")?,
            required_env("PORTAL_CLIENT_SECRET")?,
        );

        if let Ok(secs) = env::var("PORTAL_TIMEOUT_SECS") {
            config.request_timeout_secs = secs.parse().map_err(|_| {
                PortalError::Validation(format!("PORTAL_TIMEOUT_SECS is not a number: {secs}"))
            })?;
        }
        if let Ok(path) = env::var("PORTAL_STORAGE_PATH") {
            if !path.is_empty() {
                config.storage_path = PathBuf::from(path);
            }
        }

        Ok(config)
    }

    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join an endpoint path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn required_env(name: &str) -> Result<String, PortalError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(PortalError::Validation(format!(
            "{name} environment variable not set"
        ))),
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_FILE)
}
