//! Live event envelope and the known event-type set

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription key that receives every event
pub const WILDCARD: &str = "*";

/// Event types the server pushes on the live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Connected,
    Ping,
    DisplayStatusChanged,
    DisplayAssignmentChanged,
    DisplayConfigurationChanged,
    SlideshowUpdated,
    SlideshowCreated,
    SlideshowDeleted,
    SystemNotification,
    /// Untyped frame (no `event:` field on the wire)
    Message,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::Connected,
        EventType::Ping,
        EventType::DisplayStatusChanged,
        EventType::DisplayAssignmentChanged,
        EventType::DisplayConfigurationChanged,
        EventType::SlideshowUpdated,
        EventType::SlideshowCreated,
        EventType::SlideshowDeleted,
        EventType::SystemNotification,
        EventType::Message,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connected => "connected",
            EventType::Ping => "ping",
            EventType::DisplayStatusChanged => "display.status_changed",
            EventType::DisplayAssignmentChanged => "display.assignment_changed",
            EventType::DisplayConfigurationChanged => "display.configuration_changed",
            EventType::SlideshowUpdated => "slideshow.updated",
            EventType::SlideshowCreated => "slideshow.created",
            EventType::SlideshowDeleted => "slideshow.deleted",
            EventType::SystemNotification => "system.notification",
            EventType::Message => "message",
        }
    }

    /// Look up a wire frame name; `None` for names the client does not listen to
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    pub fn is_display(&self) -> bool {
        matches!(
            self,
            EventType::DisplayStatusChanged
                | EventType::DisplayAssignmentChanged
                | EventType::DisplayConfigurationChanged
        )
    }

    pub fn is_slideshow(&self) -> bool {
        matches!(
            self,
            EventType::SlideshowUpdated | EventType::SlideshowCreated | EventType::SlideshowDeleted
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

/// An event received from the live stream.
///
/// `timestamp` is the client receipt time; the server's own clock is only
/// consulted through explicit payload fields (see [`crate::PingPayload`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEvent {
    pub event_type: String,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LiveEvent {
    /// Build an event stamped with the current time
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            event_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, event_id: Option<String>) -> Self {
        self.event_id = event_id;
        self
    }

    /// Known type of this event, if any
    pub fn kind(&self) -> Option<EventType> {
        EventType::from_name(&self.event_type)
    }

    /// Deserialize the payload into a typed view
    pub fn payload<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}
