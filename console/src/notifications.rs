//! Toast notifications for live events
//!
//! Turns display, slideshow and system events into short toast messages.
//! The console has no native toast surface, so toasts are written to the log.

use serde::{Deserialize, Serialize};
use signage_core::{DisplayEvent, EventType, LiveEvent, SlideshowEvent, SystemNotification};
use signage_engine::{LiveContext, Subscription};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

// ─── Config ──────────────────────────────────────────────────────────

/// Per-category notification toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationConfig {
    /// Master switch; if false, no notifications at all
    pub enabled: bool,
    /// Displays going online/offline or being reconfigured
    pub display_status: bool,
    /// Slideshow assignment changes on a display
    pub display_assignments: bool,
    /// Slideshows created, updated or deleted
    pub slideshow_changes: bool,
    /// Server-side `system.notification` messages
    pub system_notifications: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_status: true,
            display_assignments: true,
            slideshow_changes: true,
            system_notifications: true,
        }
    }
}

/// A rendered toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub body: String,
}

impl Toast {
    fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

// ─── Handle ──────────────────────────────────────────────────────────

/// Shared handle for raising notifications from event subscribers
#[derive(Clone)]
pub struct NotificationHandle {
    config: Arc<RwLock<NotificationConfig>>,
}

impl NotificationHandle {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Update the notification configuration
    pub fn set_config(&self, config: NotificationConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn config(&self) -> NotificationConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to every event type that can raise a toast.
    ///
    /// The returned subscriptions stay active until unsubscribed.
    pub fn attach(&self, context: &LiveContext) -> signage_core::Result<Vec<Subscription>> {
        EventType::ALL
            .into_iter()
            .filter(|t| {
                t.is_display() || t.is_slideshow() || *t == EventType::SystemNotification
            })
            .map(|t| {
                let handle = self.clone();
                context.add_event_listener(t, move |event| {
                    handle.notify(event);
                })
            })
            .collect()
    }

    /// Render and emit the toast for `event`, if its category is enabled
    pub fn notify(&self, event: &LiveEvent) -> Option<Toast> {
        let kind = event.kind()?;
        if !self.allows(kind) {
            return None;
        }

        let toast = match render(kind, event) {
            Some(toast) => toast,
            None => {
                debug!(event_type = %kind, "No toast for event payload");
                return None;
            }
        };
        self.send(&toast);
        Some(toast)
    }

    fn allows(&self, kind: EventType) -> bool {
        let cfg = self.config.read().unwrap_or_else(PoisonError::into_inner);
        if !cfg.enabled {
            return false;
        }
        match kind {
            EventType::DisplayStatusChanged | EventType::DisplayConfigurationChanged => {
                cfg.display_status
            }
            EventType::DisplayAssignmentChanged => cfg.display_assignments,
            EventType::SlideshowCreated | EventType::SlideshowUpdated | EventType::SlideshowDeleted => {
                cfg.slideshow_changes
            }
            EventType::SystemNotification => cfg.system_notifications,
            EventType::Connected | EventType::Ping | EventType::Message => false,
        }
    }

    // ─── Internal ────────────────────────────────────────────────

    fn send(&self, toast: &Toast) {
        info!(target: "signage_console::toast", "{}: {}", toast.title, toast.body);
    }
}

fn render(kind: EventType, event: &LiveEvent) -> Option<Toast> {
    if kind.is_display() {
        let display: DisplayEvent = event.payload().ok()?;
        let label = display.label();
        return Some(match kind {
            EventType::DisplayStatusChanged => match display.is_online {
                Some(true) => Toast::new("🟢 Display Online", format!("{} is back online", label)),
                Some(false) => Toast::new("🔴 Display Offline", format!("{} went offline", label)),
                None => Toast::new("Display Status", format!("{} status changed", label)),
            },
            EventType::DisplayAssignmentChanged => {
                let body = match (&display.slideshow_name, display.slideshow_id) {
                    (Some(name), _) => format!("{} now shows \"{}\"", label, name),
                    (None, Some(id)) => format!("{} now shows slideshow #{}", label, id),
                    (None, None) => format!("{} has no slideshow assigned", label),
                };
                Toast::new("📺 Assignment Changed", body)
            }
            _ => Toast::new("⚙️ Display Updated", format!("{} configuration changed", label)),
        });
    }

    if kind.is_slideshow() {
        let slideshow: SlideshowEvent = event.payload().ok()?;
        let title = match kind {
            EventType::SlideshowCreated => "🆕 Slideshow Created",
            EventType::SlideshowDeleted => "🗑️ Slideshow Deleted",
            _ => "✏️ Slideshow Updated",
        };
        return Some(Toast::new(title, slideshow.label()));
    }

    if kind == EventType::SystemNotification {
        let notice: SystemNotification = event.payload().ok()?;
        let title = notice.title.unwrap_or_else(|| "System Notice".to_string());
        return Some(Toast::new(title, notice.message));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: EventType, data: serde_json::Value) -> LiveEvent {
        LiveEvent::new(kind, data)
    }

    #[test]
    fn test_display_status_toasts() {
        let handle = NotificationHandle::new(NotificationConfig::default());

        let offline = handle
            .notify(&event(
                EventType::DisplayStatusChanged,
                json!({"display_id": 7, "display_name": "Lobby", "is_online": false}),
            ))
            .unwrap();
        assert_eq!(offline.title, "🔴 Display Offline");
        assert_eq!(offline.body, "Lobby went offline");

        let online = handle
            .notify(&event(
                EventType::DisplayStatusChanged,
                json!({"display_id": 7, "is_online": true}),
            ))
            .unwrap();
        assert_eq!(online.body, "Display #7 is back online");
    }

    #[test]
    fn test_assignment_toast() {
        let handle = NotificationHandle::new(NotificationConfig::default());
        let toast = handle
            .notify(&event(
                EventType::DisplayAssignmentChanged,
                json!({"display_id": 1, "display_name": "Cafe", "slideshow_id": 4, "slideshow_name": "Menu"}),
            ))
            .unwrap();
        assert_eq!(toast.body, "Cafe now shows \"Menu\"");
    }

    #[test]
    fn test_slideshow_and_system_toasts() {
        let handle = NotificationHandle::new(NotificationConfig::default());

        let deleted = handle
            .notify(&event(EventType::SlideshowDeleted, json!({"slideshow_id": 12})))
            .unwrap();
        assert_eq!(deleted.title, "🗑️ Slideshow Deleted");
        assert_eq!(deleted.body, "Slideshow #12");

        let notice = handle
            .notify(&event(
                EventType::SystemNotification,
                json!({"message": "Maintenance at 22:00", "level": "warning"}),
            ))
            .unwrap();
        assert_eq!(notice.title, "System Notice");
        assert_eq!(notice.body, "Maintenance at 22:00");
    }

    #[test]
    fn test_toggles_filter_categories() {
        let handle = NotificationHandle::new(NotificationConfig {
            slideshow_changes: false,
            ..NotificationConfig::default()
        });
        assert!(handle
            .notify(&event(EventType::SlideshowCreated, json!({"slideshow_id": 1})))
            .is_none());
        assert!(handle
            .notify(&event(EventType::DisplayStatusChanged, json!({"display_id": 1})))
            .is_some());

        handle.set_config(NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        });
        assert!(handle
            .notify(&event(EventType::DisplayStatusChanged, json!({"display_id": 1})))
            .is_none());
    }

    #[test]
    fn test_heartbeats_and_bad_payloads_are_silent() {
        let handle = NotificationHandle::new(NotificationConfig::default());
        assert!(handle.notify(&event(EventType::Ping, json!({}))).is_none());
        assert!(handle
            .notify(&event(EventType::DisplayStatusChanged, json!({"no_id": true})))
            .is_none());
        assert!(handle.notify(&LiveEvent::new("custom", json!({}))).is_none());
    }

    #[test]
    fn test_config_deserializes_partial() {
        let cfg: NotificationConfig =
            serde_json::from_str(r#"{"systemNotifications": false}"#).unwrap();
        assert!(cfg.enabled);
        assert!(!cfg.system_notifications);
    }
}
