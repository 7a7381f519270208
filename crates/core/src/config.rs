//! Live connection configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path of the server push endpoint, relative to the API base URL
pub const EVENTS_PATH: &str = "/api/events/stream";

/// Options recognized by the live connection.
///
/// Every field has a serde default, so a partial JSON document (or `{}`)
/// deserializes into a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveConfig {
    /// Base URL of the admin API (scheme + host, no trailing path)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Session cookie (`name=value`) sent with the stream request
    #[serde(default)]
    pub session_cookie: Option<String>,
    /// Open the connection as soon as the provider is created
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
    /// Base delay in milliseconds for the first reconnect (exponential backoff)
    #[serde(default = "default_base_reconnect_interval_ms")]
    pub base_reconnect_interval_ms: u64,
    /// Upper bound in milliseconds for any reconnect delay
    #[serde(default = "default_max_reconnect_interval_ms")]
    pub max_reconnect_interval_ms: u64,
    /// Number of reconnects scheduled before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Timeout for establishing the stream
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Expected interval between server `ping` events
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Extra time allowed for a late `ping`
    #[serde(default = "default_heartbeat_grace_ms")]
    pub heartbeat_grace_ms: u64,
    /// How long the "reconnected" confirmation stays up after going online
    #[serde(default = "default_reconnected_banner_ms")]
    pub reconnected_banner_ms: u64,
}

fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_auto_connect() -> bool { true }
fn default_base_reconnect_interval_ms() -> u64 { 1000 }
fn default_max_reconnect_interval_ms() -> u64 { 30_000 }
fn default_max_reconnect_attempts() -> u32 { 10 }
fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_heartbeat_interval_ms() -> u64 { 30_000 }
fn default_heartbeat_grace_ms() -> u64 { 10_000 }
fn default_reconnected_banner_ms() -> u64 { 3000 }

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: None,
            auto_connect: default_auto_connect(),
            base_reconnect_interval_ms: default_base_reconnect_interval_ms(),
            max_reconnect_interval_ms: default_max_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_grace_ms: default_heartbeat_grace_ms(),
            reconnected_banner_ms: default_reconnected_banner_ms(),
        }
    }
}

impl LiveConfig {
    /// Create a configuration for the given API base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Full URL of the event stream endpoint
    pub fn events_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), EVENTS_PATH)
    }

    pub fn base_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_interval_ms)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_grace(&self) -> Duration {
        Duration::from_millis(self.heartbeat_grace_ms)
    }

    pub fn reconnected_banner(&self) -> Duration {
        Duration::from_millis(self.reconnected_banner_ms)
    }

    /// Reject settings the reconnect loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.base_reconnect_interval_ms == 0 {
            return Err(Error::Config("base reconnect interval must be > 0".to_string()));
        }
        if self.max_reconnect_interval_ms == 0 {
            return Err(Error::Config("max reconnect interval must be > 0".to_string()));
        }
        if self.max_reconnect_interval_ms < self.base_reconnect_interval_ms {
            return Err(Error::Config(
                "max reconnect interval must be >= base reconnect interval".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect timeout must be > 0".to_string()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(Error::Config("heartbeat interval must be > 0".to_string()));
        }
        Ok(())
    }
}
