//! System and heartbeat payloads

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Payload of `system.notification` events.
///
/// Only the fields the console renders are typed; the rest of the object
/// stays available on [`crate::LiveEvent::data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNotification {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: String,
    /// `info`, `warning`, `error`, ... as sent by the server
    #[serde(default)]
    pub level: Option<String>,
}

/// Payload of `ping` heartbeat events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingPayload {
    /// Server send time, used for latency estimation
    #[serde(default, deserialize_with = "deserialize_timestamp_lenient")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PingPayload {
    /// Latency between the server send time and `now`, floored at zero to
    /// absorb clock skew. `None` when the server sent no timestamp.
    pub fn latency_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        self.timestamp
            .map(|sent| (now - sent).num_milliseconds().max(0) as u64)
    }
}

/// Deserialize a timestamp that may arrive as an RFC 3339 string, epoch
/// milliseconds, or null
fn deserialize_timestamp_lenient<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct TimestampLenient;

    impl<'de> de::Visitor<'de> for TimestampLenient {
        type Value = Option<DateTime<Utc>>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an RFC 3339 string, epoch milliseconds, or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            DateTime::parse_from_rfc3339(v)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(de::Error::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            Ok(Utc.timestamp_millis_opt(v).single())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            self.visit_i64(v as i64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
            self.visit_i64(v as i64)
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(TimestampLenient)
}
