//! Shared live-connection context
//!
//! One [`LiveProvider`] per admin session owns the connection and its health
//! monitor. Consumers receive cheap [`LiveContext`] clones that reach the
//! same connection but never own it, so only one physical stream exists no
//! matter how many consumers subscribe.

use crate::connection::ConnectionManager;
use crate::dispatch::Subscription;
use crate::health::{HealthMonitor, HealthStatus};
use signage_core::{ConnectionState, Error, LiveConfig, LiveEvent, Result, Visibility};
use signage_networking::{EventTransport, HttpEventTransport};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::info;

struct Session {
    manager: Arc<ConnectionManager>,
    monitor: HealthMonitor,
}

/// Owner of the session's live connection.
///
/// Dropping the provider (or calling [`shutdown`](Self::shutdown))
/// disconnects and stops the monitor; outstanding contexts then fail with
/// [`Error::ContextUnavailable`].
pub struct LiveProvider {
    session: Arc<Session>,
}

impl LiveProvider {
    /// Provider over the HTTP event stream described by `config`
    pub fn from_config(config: LiveConfig) -> Result<Self> {
        let transport = HttpEventTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn new(config: LiveConfig, transport: Arc<dyn EventTransport>) -> Result<Self> {
        let manager = ConnectionManager::new(config, transport)?;
        let monitor = HealthMonitor::start(Arc::clone(&manager))?;
        info!(url = %manager.config().events_url(), "Live provider ready");

        Ok(Self {
            session: Arc::new(Session { manager, monitor }),
        })
    }

    /// New accessor for a consumer
    pub fn context(&self) -> LiveContext {
        LiveContext {
            session: Arc::downgrade(&self.session),
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.session.manager
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.session.monitor
    }

    /// Close the connection for good
    pub fn shutdown(self) {}
}

impl Drop for LiveProvider {
    fn drop(&mut self) {
        self.session.monitor.stop();
        self.session.manager.disconnect();
        info!("Live provider shut down");
    }
}

/// Consumer handle onto the provider's connection
#[derive(Clone)]
pub struct LiveContext {
    session: Weak<Session>,
}

impl LiveContext {
    /// Resolve an optional context slot, failing when it is empty or its
    /// provider is gone
    pub fn require(slot: Option<&LiveContext>) -> Result<LiveContext> {
        match slot {
            Some(context) if context.is_available() => Ok(context.clone()),
            _ => Err(Error::ContextUnavailable),
        }
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.session.upgrade().ok_or(Error::ContextUnavailable)
    }

    pub fn is_available(&self) -> bool {
        self.session.strong_count() > 0
    }

    /// Request a connect; a no-op when already connecting or connected
    pub fn connect(&self) -> Result<()> {
        self.session()?.manager.connect();
        Ok(())
    }

    pub fn add_event_listener<F>(
        &self,
        event_type: impl Into<String>,
        handler: F,
    ) -> Result<Subscription>
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        Ok(self.session()?.manager.add_event_listener(event_type, handler))
    }

    pub fn connection_state(&self) -> Result<ConnectionState> {
        Ok(self.session()?.manager.connection_state())
    }

    pub fn error(&self) -> Result<Option<String>> {
        Ok(self.session()?.manager.error())
    }

    pub fn last_event(&self) -> Result<Option<LiveEvent>> {
        Ok(self.session()?.manager.last_event())
    }

    pub fn event_history(&self) -> Result<Vec<LiveEvent>> {
        Ok(self.session()?.manager.event_history())
    }

    pub fn subscribe_state(&self) -> Result<watch::Receiver<ConnectionState>> {
        Ok(self.session()?.manager.subscribe_state())
    }

    pub fn health(&self) -> Result<HealthStatus> {
        Ok(self.session()?.monitor.status())
    }

    pub fn subscribe_health(&self) -> Result<watch::Receiver<HealthStatus>> {
        Ok(self.session()?.monitor.subscribe())
    }

    /// Forward a host visibility change to the monitor
    pub fn set_visibility(&self, visibility: Visibility) -> Result<()> {
        self.session()?.monitor.set_visibility(visibility);
        Ok(())
    }

    /// Forward a network online/offline change to the monitor
    pub fn set_online(&self, online: bool) -> Result<()> {
        self.session()?.monitor.set_online(online);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{eventually, ScriptedTransport};
    use signage_networking::SseFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn provider(auto_connect: bool) -> (LiveProvider, Arc<ScriptedTransport>) {
        let config = LiveConfig {
            auto_connect,
            base_reconnect_interval_ms: 10,
            max_reconnect_interval_ms: 100,
            ..LiveConfig::default()
        };
        let transport = Arc::new(ScriptedTransport::new());
        let provider = LiveProvider::new(config, transport.clone()).unwrap();
        (provider, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_contexts_share_one_connection() {
        let (provider, transport) = provider(true);
        let _tx = transport.push_open();
        let a = provider.context();
        let b = a.clone();

        eventually(|| a.connection_state().unwrap() == ConnectionState::Connected).await;
        a.connect().unwrap();
        b.connect().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(transport.opens(), 1);
        assert_eq!(b.connection_state().unwrap(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_subscribers_receive_events() {
        let (provider, _transport) = provider(false);
        let context = provider.context();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);

        let subscription = context
            .add_event_listener("slideshow.deleted", move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        provider
            .manager()
            .ingest(&SseFrame::new("slideshow.deleted", r#"{"slideshow_id": 3}"#));
        subscription.unsubscribe();
        provider
            .manager()
            .ingest(&SseFrame::new("slideshow.deleted", r#"{"slideshow_id": 4}"#));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(context.event_history().unwrap().len(), 2);
        assert_eq!(context.last_event().unwrap().unwrap().data["slideshow_id"], 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_provider_disconnects() {
        let (provider, transport) = provider(true);
        let context = provider.context();
        let manager = Arc::clone(provider.manager());
        let mut state = context.subscribe_state().unwrap();

        // every open fails; the provider goes away mid-backoff
        eventually(|| manager.connection_state() == ConnectionState::Error).await;
        drop(provider);

        assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
        assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);
        let opens = transport.opens();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), opens);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphaned_context_fails_loudly() {
        let (provider, transport) = provider(false);
        let context = provider.context();
        assert!(context.is_available());

        provider.shutdown();

        assert!(!context.is_available());
        assert!(matches!(context.connect(), Err(Error::ContextUnavailable)));
        assert!(matches!(context.connection_state(), Err(Error::ContextUnavailable)));
        assert!(matches!(
            context.add_event_listener("*", |_| {}),
            Err(Error::ContextUnavailable)
        ));
        assert!(matches!(context.health(), Err(Error::ContextUnavailable)));
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_require() {
        let (provider, _transport) = provider(false);
        let context = provider.context();

        assert!(LiveContext::require(Some(&context)).is_ok());
        assert!(matches!(LiveContext::require(None), Err(Error::ContextUnavailable)));

        drop(provider);
        assert!(matches!(
            LiveContext::require(Some(&context)),
            Err(Error::ContextUnavailable)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_signals_route_through_context() {
        let (provider, _transport) = provider(false);
        let context = provider.context();

        context.set_online(false).unwrap();
        assert!(!context.health().unwrap().online);
        context.set_visibility(Visibility::Hidden).unwrap();
        assert_eq!(provider.monitor().status().visibility, Visibility::Hidden);
    }
}
