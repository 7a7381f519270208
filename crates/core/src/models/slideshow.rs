//! Slideshow event payloads

use serde::{Deserialize, Serialize};

/// Payload of the `slideshow.*` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideshowEvent {
    pub slideshow_id: i64,
    #[serde(default)]
    pub slideshow_name: Option<String>,
    /// Full slideshow record, when the server includes it
    #[serde(default)]
    pub slideshow: Option<serde_json::Value>,
}

impl SlideshowEvent {
    pub fn label(&self) -> String {
        match &self.slideshow_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Slideshow #{}", self.slideshow_id),
        }
    }
}
