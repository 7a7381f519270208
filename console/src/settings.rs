//! Console settings: JSON file, then environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use signage_core::LiveConfig;
use std::path::Path;

use crate::notifications::NotificationConfig;

/// Overrides `baseUrl`
pub const BASE_URL_ENV: &str = "SIGNAGE_BASE_URL";
/// Overrides `sessionCookie`
pub const SESSION_COOKIE_ENV: &str = "SIGNAGE_SESSION_COOKIE";

/// Everything the console reads at startup.
///
/// Live connection options sit at the top level of the document,
/// notification toggles under `notifications`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(flatten)]
    pub live: LiveConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl ConsoleSettings {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("malformed settings document")
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.live.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(cookie) = lookup(SESSION_COOKIE_ENV).filter(|v| !v.trim().is_empty()) {
            self.live.session_cookie = Some(cookie.trim().to_string());
        }
    }
}

/// Load settings from an optional file, apply the environment, validate
pub fn load(path: Option<&Path>) -> Result<ConsoleSettings> {
    let mut settings = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            ConsoleSettings::from_json(&raw)
                .with_context(|| format!("invalid settings file {}", path.display()))?
        }
        None => ConsoleSettings::default(),
    };

    settings.apply_overrides(|key| std::env::var(key).ok());
    settings
        .live
        .validate()
        .context("invalid live connection settings")?;
    Ok(settings)
}
