//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use fw_praamid::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_PORTAL_BASE_URL};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the online API.
    pub api_base_url: String,

    /// Base URL of the customer portal, used for checkout links.
    pub portal_base_url: String,

    /// Bearer token copied from a logged-in portal session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Seconds between the starts of consecutive availability checks.
    pub poll_interval_secs: u64,

    pub request_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_registration: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("portal_base_url", &self.portal_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("contact_email", &self.contact_email)
            .field("contact_phone", &self.contact_phone)
            .field("vehicle_registration", &self.vehicle_registration)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            portal_base_url: DEFAULT_PORTAL_BASE_URL.to_string(),
            auth_token: None,
            poll_interval_secs: fw_core::DEFAULT_POLL_INTERVAL.as_secs(),
            request_timeout_secs: fw_praamid::DEFAULT_TIMEOUT.as_secs(),
            contact_email: None,
            contact_phone: None,
            vehicle_registration: None,
        }
    }
}

impl Config {
    /// Loads configuration from the default location, then an optional
    /// explicit file, then `FW_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FW_*)
        figment = figment.merge(Env::prefixed("FW_"));

        figment.extract()
    }

    /// Polling interval, never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api_base_url.clone(),
            portal_base_url: self.portal_base_url.clone(),
            auth_token: self.auth_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }
}

/// Returns the platform-specific config directory for fw.
///
/// On Linux: `~/.config/fw`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fw"))
}
