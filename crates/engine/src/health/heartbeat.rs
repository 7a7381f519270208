//! Heartbeat bookkeeping

use chrono::{DateTime, Utc};
use signage_core::{HealthLevel, PingPayload};

/// Tracks `ping` arrivals against the heartbeat deadline
#[derive(Debug, Clone, Default)]
pub struct HeartbeatTracker {
    missed: u32,
    level: HealthLevel,
    last_ping_at: Option<DateTime<Utc>>,
    latency_ms: Option<u64>,
}

impl HeartbeatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ping received at `now`
    pub fn record_ping(&mut self, payload: &PingPayload, now: DateTime<Utc>) {
        self.missed = 0;
        self.level = HealthLevel::Healthy;
        self.last_ping_at = Some(now);
        if let Some(latency) = payload.latency_ms(now) {
            self.latency_ms = Some(latency);
        }
    }

    /// The deadline passed without a ping
    pub fn miss(&mut self) -> HealthLevel {
        self.missed = self.missed.saturating_add(1);
        self.level = HealthLevel::Degraded;
        self.level
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn level(&self) -> HealthLevel {
        self.level
    }

    pub fn last_ping_at(&self) -> Option<DateTime<Utc>> {
        self.last_ping_at
    }

    /// Latest measured latency
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }
}
