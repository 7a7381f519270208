//! Signage Engine - Live connection, reconnect policy, event fan-out and health

pub mod backoff;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod health;

#[cfg(test)]
mod test_support;

pub use backoff::{compute_delay, compute_delay_with};
pub use connection::ConnectionManager;
pub use context::{LiveContext, LiveProvider};
pub use dispatch::{EventDispatcher, Handler, Subscription};
pub use health::{HealthMonitor, HealthStatus};
