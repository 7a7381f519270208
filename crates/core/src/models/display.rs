//! Display event payloads

use serde::{Deserialize, Serialize};

/// Payload of the `display.*` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayEvent {
    pub display_id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_online: Option<bool>,
    /// Full display record, when the server includes it
    #[serde(default)]
    pub display: Option<serde_json::Value>,
    #[serde(default)]
    pub slideshow_id: Option<i64>,
    #[serde(default)]
    pub slideshow_name: Option<String>,
}

impl DisplayEvent {
    /// Name for toasts and badges, falling back to the id
    pub fn label(&self) -> String {
        if self.display_name.is_empty() {
            format!("Display #{}", self.display_id)
        } else {
            self.display_name.clone()
        }
    }
}
