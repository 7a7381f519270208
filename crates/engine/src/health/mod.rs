//! Connection health and host signals
//!
//! A [`HealthMonitor`] sits beside a [`ConnectionManager`] and watches three
//! things the connection itself cannot see: host visibility, network
//! reachability and heartbeat pings. It never owns the connection; it only
//! nudges it.

mod heartbeat;
mod network;

pub use heartbeat::HeartbeatTracker;
pub use network::{NetworkTracker, NetworkTransition};

use crate::connection::ConnectionManager;
use crate::dispatch::Subscription;
use chrono::{DateTime, Utc};
use serde::Serialize;
use signage_core::{Error, EventType, HealthLevel, LiveEvent, PingPayload, Result, Visibility};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot published to badges on every health change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub level: HealthLevel,
    pub missed_pings: u32,
    pub latency_ms: Option<u64>,
    pub last_ping_at: Option<DateTime<Utc>>,
    /// `false` raises the offline advisory
    pub online: bool,
    /// Set for a short while after the network comes back
    pub reconnected: bool,
    pub visibility: Visibility,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            level: HealthLevel::Unknown,
            missed_pings: 0,
            latency_ms: None,
            last_ping_at: None,
            online: true,
            reconnected: false,
            visibility: Visibility::Visible,
        }
    }
}

struct State {
    heartbeat: HeartbeatTracker,
    network: NetworkTracker,
    visibility: Visibility,
    reconnected: bool,
    banner_task: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    status_tx: watch::Sender<HealthStatus>,
    /// Signalled on every ping; re-arms the watchdog deadline
    pinged: Notify,
}

impl Shared {
    fn new() -> Self {
        let (status_tx, _) = watch::channel(HealthStatus::default());
        Self {
            state: Mutex::new(State {
                heartbeat: HeartbeatTracker::new(),
                network: NetworkTracker::new(),
                visibility: Visibility::Visible,
                reconnected: false,
                banner_task: None,
            }),
            status_tx,
            pinged: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.status_tx.send_replace(HealthStatus {
            level: state.heartbeat.level(),
            missed_pings: state.heartbeat.missed(),
            latency_ms: state.heartbeat.latency_ms(),
            last_ping_at: state.heartbeat.last_ping_at(),
            online: state.network.is_online(),
            reconnected: state.reconnected,
            visibility: state.visibility,
        });
    }

    fn record_ping(&self, event: &LiveEvent) {
        let payload = event.payload::<PingPayload>().unwrap_or_else(|e| {
            debug!(error = %e, "Ping without a usable timestamp");
            PingPayload::default()
        });

        let mut state = self.lock();
        state.heartbeat.record_ping(&payload, Utc::now());
        debug!(latency_ms = ?state.heartbeat.latency_ms(), "Heartbeat received");
        self.publish(&state);
        drop(state);
        self.pinged.notify_one();
    }

    fn miss_heartbeat(&self) {
        let mut state = self.lock();
        state.heartbeat.miss();
        warn!(missed = state.heartbeat.missed(), "Heartbeat missed");
        self.publish(&state);
    }

    fn clear_banner(&self) {
        let mut state = self.lock();
        state.reconnected = false;
        state.banner_task = None;
        self.publish(&state);
    }
}

/// Watches visibility, network and heartbeats for one connection
pub struct HealthMonitor {
    manager: Arc<ConnectionManager>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    ping_subscription: Subscription,
    runtime: Handle,
}

impl HealthMonitor {
    /// Subscribe to pings and start the heartbeat watchdog
    pub fn start(manager: Arc<ConnectionManager>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let shared = Arc::new(Shared::new());

        let ping_shared = Arc::clone(&shared);
        let ping_subscription = manager
            .add_event_listener(EventType::Ping, move |event| ping_shared.record_ping(event));

        let period = manager.config().heartbeat_interval() + manager.config().heartbeat_grace();
        let cancel = CancellationToken::new();
        runtime.spawn(watchdog(Arc::clone(&shared), period, cancel.clone()));
        info!(period_ms = period.as_millis() as u64, "Health monitor started");

        Ok(Self {
            manager,
            shared,
            cancel,
            ping_subscription,
            runtime,
        })
    }

    /// Feed a host visibility change.
    ///
    /// Becoming visible while the connection is in `Error` reconnects at once
    /// instead of waiting for the backoff timer.
    pub fn set_visibility(&self, visibility: Visibility) {
        {
            let mut state = self.shared.lock();
            state.visibility = visibility;
            self.shared.publish(&state);
        }

        if visibility == Visibility::Visible && self.manager.reconnect_if_failed() {
            info!("Host visible again, reconnecting without waiting for backoff");
        }
    }

    /// Feed a network online/offline signal
    pub fn set_online(&self, online: bool) {
        let mut state = self.shared.lock();
        match state.network.set_online(online) {
            NetworkTransition::Unchanged => return,
            NetworkTransition::WentOffline => {
                warn!("Network offline, live updates paused");
                state.reconnected = false;
                if let Some(banner) = state.banner_task.take() {
                    banner.abort();
                }
            }
            NetworkTransition::Restored => {
                info!("Network back online");
                state.reconnected = true;
                if let Some(banner) = state.banner_task.take() {
                    banner.abort();
                }
                let shared = Arc::clone(&self.shared);
                let linger = self.manager.config().reconnected_banner();
                state.banner_task = Some(self.runtime.spawn(async move {
                    tokio::time::sleep(linger).await;
                    shared.clear_banner();
                }));
            }
        }
        self.shared.publish(&state);
    }

    pub fn status(&self) -> HealthStatus {
        self.shared.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Cancel the watchdog and banner timers and stop listening for pings
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.ping_subscription.unsubscribe();
        if let Some(banner) = self.shared.lock().banner_task.take() {
            banner.abort();
        }
        info!("Health monitor stopped");
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Counts a miss each time `period` (interval + grace) elapses since the
/// last ping or the last miss
async fn watchdog(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Heartbeat watchdog cancelled, exiting");
                break;
            }
            _ = shared.pinged.notified() => continue,
            _ = tokio::time::sleep(period) => shared.miss_heartbeat(),
        }
    }
}
