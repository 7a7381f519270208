//! Live connection manager
//!
//! Owns the single push-stream connection: opens it through an
//! [`EventTransport`], tracks the [`ConnectionState`] machine, schedules
//! reconnects under the backoff policy and hands every inbound frame to the
//! [`EventDispatcher`].
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open──► Connected
//!      ▲                          ▲                   │ fault
//!      │ disconnect() /           │ retry timer       ▼
//!      └── retries exhausted ◄────┴────────────────  Error
//! ```
//!
//! All transitions happen under one lock. Lifecycle callbacks carry the
//! generation of the connection that produced them; callbacks from a
//! superseded connection are ignored.

use crate::backoff::compute_delay;
use crate::dispatch::{EventDispatcher, Subscription};
use futures_util::StreamExt;
use signage_core::{ConnectionState, Error, EventType, LiveConfig, LiveEvent, Result};
use signage_networking::{EventTransport, SseFrame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    error: Option<String>,
    /// Reconnects scheduled since the last successful open
    attempts: u32,
    generation: u64,
    stream_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    retries_scheduled: u64,
    last_event_id: Option<String>,
}

/// Manages one resilient connection to the server event stream
pub struct ConnectionManager {
    config: LiveConfig,
    transport: Arc<dyn EventTransport>,
    dispatcher: EventDispatcher,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
    runtime: Handle,
    this: Weak<ConnectionManager>,
}

impl ConnectionManager {
    /// Create a manager on the current Tokio runtime.
    ///
    /// With `auto_connect` enabled the first [`connect`](Self::connect) runs
    /// on a spawned task, after construction has returned.
    pub fn new(config: LiveConfig, transport: Arc<dyn EventTransport>) -> Result<Arc<Self>> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        let manager = Arc::new_cyclic(|this| Self {
            config,
            transport,
            dispatcher: EventDispatcher::new(),
            inner: Mutex::new(Inner::default()),
            state_tx,
            runtime,
            this: this.clone(),
        });

        if manager.config.auto_connect {
            let weak = Arc::downgrade(&manager);
            manager.runtime.spawn(async move {
                if let Some(manager) = weak.upgrade() {
                    manager.connect();
                }
            });
        }

        Ok(manager)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        if inner.state != state {
            debug!(from = %inner.state, to = %state, "Connection state change");
            inner.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Open the stream unless an attempt is already in flight or open
    pub fn connect(&self) {
        let mut inner = self.lock();
        self.connect_locked(&mut inner);
    }

    fn connect_locked(&self, inner: &mut Inner) {
        if inner.state.is_active() {
            debug!(state = %inner.state, "Connect ignored, connection already active");
            return;
        }

        // a manual connect supersedes any pending retry
        if let Some(retry) = inner.retry_task.take() {
            retry.abort();
        }

        inner.generation += 1;
        inner.error = None;
        self.set_state(inner, ConnectionState::Connecting);
        info!(attempt = inner.attempts, "Connecting to event stream");

        let task = drive(
            self.this.clone(),
            Arc::clone(&self.transport),
            inner.generation,
            inner.last_event_id.clone(),
        );
        inner.stream_task = Some(self.runtime.spawn(task));
    }

    /// Reconnect immediately if the connection is in `Error`, skipping the
    /// pending backoff timer. Returns whether a connect was started.
    pub fn reconnect_if_failed(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Error {
            return false;
        }
        self.connect_locked(&mut inner);
        true
    }

    /// Close the stream, cancel any pending reconnect and reset the attempt
    /// counter. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        if let Some(retry) = inner.retry_task.take() {
            retry.abort();
        }
        if let Some(stream) = inner.stream_task.take() {
            stream.abort();
        }
        inner.generation += 1;
        inner.attempts = 0;

        if inner.state != ConnectionState::Disconnected {
            info!("Disconnected from event stream");
        }
        self.set_state(&mut inner, ConnectionState::Disconnected);
    }

    /// Stream opened. Returns `false` when the connection was superseded.
    fn handle_open(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.attempts = 0;
        self.set_state(&mut inner, ConnectionState::Connected);
        info!("Event stream connected");
        true
    }

    /// Connection-level failure: record it and retry under the backoff
    /// policy, or give up once the ceiling is reached
    fn handle_fault(&self, generation: u64, err: &Error) {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(error = %err, "Ignoring fault from superseded connection");
            return;
        }

        // called from the stream task itself, which is about to end
        inner.stream_task = None;
        let message = err.to_string();
        inner.error = Some(message.clone());
        self.set_state(&mut inner, ConnectionState::Error);

        let max_attempts = self.config.max_reconnect_attempts;
        if inner.attempts >= max_attempts {
            error!(
                attempts = inner.attempts,
                error = %message,
                "Reconnect attempts exhausted, giving up"
            );
            self.set_state(&mut inner, ConnectionState::Disconnected);
            return;
        }

        let delay = compute_delay(
            inner.attempts,
            self.config.base_reconnect_interval(),
            self.config.max_reconnect_interval(),
        );
        inner.attempts += 1;
        inner.retries_scheduled += 1;
        warn!(
            attempt = inner.attempts,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "Event stream fault, reconnecting after backoff"
        );

        let manager = self.this.clone();
        inner.retry_task = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                manager.fire_retry(generation);
            }
        }));
    }

    /// Retry timer fired; reads the live attempt counter and configuration
    fn fire_retry(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != ConnectionState::Error {
            return;
        }
        // this task is the retry task; let it finish instead of aborting it
        inner.retry_task = None;
        self.connect_locked(&mut inner);
    }

    /// Check a frame belongs to the current connection and remember its id
    fn accept_frame(&self, generation: u64, frame: &SseFrame) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        if frame.id.is_some() {
            inner.last_event_id = frame.id.clone();
        }
        true
    }

    /// Parse a frame and dispatch it as an event.
    ///
    /// Frames with an unknown name or a non-JSON payload are logged and
    /// dropped; connection state is never affected.
    pub fn ingest(&self, frame: &SseFrame) -> Option<LiveEvent> {
        let Some(kind) = EventType::from_name(&frame.event) else {
            debug!(event = %frame.event, "Ignoring frame with unknown event name");
            return None;
        };

        let data: serde_json::Value = match serde_json::from_str(&frame.data) {
            Ok(data) => data,
            Err(e) => {
                warn!(event_type = %kind, error = %e, "Dropping frame with invalid JSON");
                return None;
            }
        };

        debug!(event_type = %kind, id = ?frame.id, "Event received");
        let event = LiveEvent::new(kind, data).with_id(frame.id.clone());
        Some(self.dispatcher.dispatch_event(event))
    }

    /// Subscribe to an event type (or `*`); returns the disposer
    pub fn add_event_listener<F>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(event_type, handler)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Last connection error message, if any
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn last_event(&self) -> Option<LiveEvent> {
        self.dispatcher.last_event()
    }

    /// Recent events, oldest first
    pub fn event_history(&self) -> Vec<LiveEvent> {
        self.dispatcher.history()
    }

    /// Reconnects scheduled since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.lock().attempts
    }

    /// Total reconnect timers created over the manager's lifetime
    pub fn scheduled_retries(&self) -> u64 {
        self.lock().retries_scheduled
    }

    /// Watch channel following every state change
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(retry) = inner.retry_task.take() {
            retry.abort();
        }
        if let Some(stream) = inner.stream_task.take() {
            stream.abort();
        }
    }
}

/// Background task for one connection attempt: open, then pump frames until
/// the stream faults or the connection is superseded.
///
/// Holds the manager weakly so an abandoned manager is not kept alive.
async fn drive(
    manager: Weak<ConnectionManager>,
    transport: Arc<dyn EventTransport>,
    generation: u64,
    last_event_id: Option<String>,
) {
    let opened = transport.open(last_event_id).await;
    let Some(this) = manager.upgrade() else {
        return;
    };

    let mut frames = match opened {
        Ok(frames) => frames,
        Err(e) => {
            this.handle_fault(generation, &e);
            return;
        }
    };
    if !this.handle_open(generation) {
        return;
    }
    drop(this);

    loop {
        let item = frames.next().await;
        let Some(this) = manager.upgrade() else {
            return;
        };

        match item {
            Some(Ok(frame)) => {
                if !this.accept_frame(generation, &frame) {
                    return;
                }
                this.ingest(&frame);
            }
            Some(Err(e)) if e.is_transport_fault() => {
                this.handle_fault(generation, &e);
                return;
            }
            Some(Err(e)) => warn!(error = %e, "Skipping undecodable frame"),
            None => {
                this.handle_fault(generation, &Error::StreamClosed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{eventually, ScriptedTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(max_attempts: u32) -> LiveConfig {
        LiveConfig {
            auto_connect: false,
            base_reconnect_interval_ms: 10,
            max_reconnect_interval_ms: 200,
            max_reconnect_attempts: max_attempts,
            ..LiveConfig::default()
        }
    }

    fn manager(config: LiveConfig) -> (Arc<ConnectionManager>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = ConnectionManager::new(config, transport.clone()).unwrap();
        (manager, transport)
    }

    fn frame(event: &str, data: &str) -> Result<SseFrame> {
        Ok(SseFrame::new(event, data))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_idempotent() {
        let (manager, transport) = manager(config(10));
        let _tx = transport.push_open();

        manager.connect();
        manager.connect();
        assert_eq!(manager.connection_state(), ConnectionState::Connecting);

        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        manager.connect();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(transport.opens(), 1);
        assert_eq!(manager.reconnect_attempts(), 0);
        assert!(manager.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_retries_then_disconnected() {
        let (manager, transport) = manager(config(2));

        manager.connect();
        eventually(|| {
            manager.connection_state() == ConnectionState::Disconnected
                && manager.scheduled_retries() == 2
        })
        .await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(manager.scheduled_retries(), 2);
        // initial attempt plus one per retry
        assert_eq!(transport.opens(), 3);
        assert!(manager.error().unwrap().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_of_ten() {
        let (manager, transport) = manager(config(10));

        manager.connect();
        eventually(|| {
            manager.connection_state() == ConnectionState::Disconnected
                && manager.scheduled_retries() == 10
        })
        .await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(manager.scheduled_retries(), 10);
        assert_eq!(transport.opens(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_counter() {
        let (manager, transport) = manager(config(3));
        transport.push_failure("reset by peer");
        transport.push_failure("reset by peer");
        let tx = transport.push_open();

        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        assert_eq!(manager.scheduled_retries(), 2);
        assert_eq!(manager.reconnect_attempts(), 0);

        // server drops the stream; a full ceiling of retries is available again
        drop(tx);
        eventually(|| manager.connection_state() == ConnectionState::Disconnected).await;
        assert_eq!(manager.scheduled_retries(), 5);
        assert_eq!(transport.opens(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_retry() {
        let mut cfg = config(10);
        cfg.base_reconnect_interval_ms = 1000;
        cfg.max_reconnect_interval_ms = 30_000;
        let (manager, transport) = manager(cfg);

        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Error).await;
        assert_eq!(manager.reconnect_attempts(), 1);

        manager.disconnect();
        manager.disconnect();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_attempts(), 0);
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_connect_during_backoff() {
        let mut cfg = config(10);
        cfg.base_reconnect_interval_ms = 5000;
        cfg.max_reconnect_interval_ms = 30_000;
        let (manager, transport) = manager(cfg);
        transport.push_failure("timeout");
        let _tx = transport.push_open();

        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Error).await;
        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;

        // the superseded retry timer never opens a second connection
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), 2);
        assert_eq!(manager.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_reach_subscribers_in_order() {
        let (manager, transport) = manager(config(10));
        let tx = transport.push_open();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let specific = Arc::clone(&seen);
        let _s = manager.add_event_listener("display.status_changed", move |e| {
            specific.lock().unwrap().push(format!("specific:{}", e.data["display_id"]));
        });
        let wildcard = Arc::clone(&seen);
        let _w = manager.add_event_listener("*", move |e| {
            wildcard.lock().unwrap().push(format!("wildcard:{}", e.event_type));
        });

        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;

        tx.send(frame("display.status_changed", r#"{"display_id": 7, "is_online": false}"#))
            .unwrap();
        tx.send(frame("slideshow.created", r#"{"slideshow_id": 2}"#)).unwrap();
        eventually(|| manager.event_history().len() == 2).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "specific:7".to_string(),
                "wildcard:display.status_changed".to_string(),
                "wildcard:slideshow.created".to_string(),
            ]
        );
        assert_eq!(manager.last_event().unwrap().event_type, "slideshow.created");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_frames_are_dropped_without_state_change() {
        let (manager, transport) = manager(config(10));
        let tx = transport.push_open();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let _w = manager.add_event_listener("*", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;

        tx.send(frame("ping", "not json")).unwrap();
        tx.send(frame("display.exploded", "{}")).unwrap();
        tx.send(Err(Error::InvalidFrame("too long".into()))).unwrap();
        tx.send(frame("message", r#"{"hello": "world"}"#)).unwrap();
        eventually(|| calls.load(Ordering::SeqCst) == 1).await;

        assert_eq!(manager.connection_state(), ConnectionState::Connected);
        assert_eq!(manager.event_history().len(), 1);
        assert_eq!(manager.last_event().unwrap().event_type, "message");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resumes_from_last_event_id() {
        let (manager, transport) = manager(config(10));
        let tx = transport.push_open();
        let _tx2 = transport.push_open();

        manager.connect();
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        tx.send(Ok(SseFrame::new("ping", "{}").with_id("41"))).unwrap();
        eventually(|| manager.event_history().len() == 1).await;
        assert_eq!(manager.last_event().unwrap().event_id.as_deref(), Some("41"));

        drop(tx);
        eventually(|| transport.opens() == 2).await;
        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        assert_eq!(transport.last_event_ids(), vec![None, Some("41".to_string())]);
        assert!(manager.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_connect_is_deferred() {
        let transport = Arc::new(ScriptedTransport::new());
        let _tx = transport.push_open();
        let cfg = LiveConfig {
            auto_connect: true,
            ..LiveConfig::default()
        };

        let manager = ConnectionManager::new(cfg, transport.clone()).unwrap();
        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(transport.opens(), 0);

        eventually(|| manager.connection_state() == ConnectionState::Connected).await;
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_watch_follows_transitions() {
        let (manager, transport) = manager(config(0));
        let mut rx = manager.subscribe_state();

        manager.connect();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connecting);

        eventually(|| manager.connection_state() == ConnectionState::Disconnected).await;
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Disconnected);
        assert_eq!(manager.scheduled_retries(), 0);
        assert_eq!(transport.opens(), 1);
    }

    #[test]
    fn test_requires_runtime() {
        let transport = Arc::new(ScriptedTransport::new());
        let result = ConnectionManager::new(config(1), transport);
        assert!(matches!(result, Err(Error::Runtime(_))));
    }
}
