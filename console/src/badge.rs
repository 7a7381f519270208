//! Connection badge
//!
//! One status line combining connection state, network advisory and
//! heartbeat health, re-rendered on every change.

use signage_core::{ConnectionState, HealthLevel};
use signage_engine::{HealthStatus, LiveContext};
use tokio::task::JoinHandle;
use tracing::info;

/// Render the badge line
pub fn render_status(state: ConnectionState, health: &HealthStatus, error: Option<&str>) -> String {
    let mut line = match state {
        ConnectionState::Connected => "● Live".to_string(),
        ConnectionState::Connecting => "◌ Connecting...".to_string(),
        ConnectionState::Error => match error {
            Some(message) => format!("⚠ Reconnecting ({})", message),
            None => "⚠ Reconnecting".to_string(),
        },
        ConnectionState::Disconnected => "○ Disconnected".to_string(),
    };

    if !health.online {
        line.push_str(" | offline: live updates paused");
    } else if health.reconnected {
        line.push_str(" | back online");
    }

    if state == ConnectionState::Connected {
        match health.level {
            HealthLevel::Degraded => {
                line.push_str(&format!(" | heartbeat late ({} missed)", health.missed_pings));
            }
            HealthLevel::Healthy => {
                if let Some(latency) = health.latency_ms {
                    line.push_str(&format!(" | {} ms", latency));
                }
            }
            HealthLevel::Unknown => {}
        }
    }

    line
}

/// Log the badge whenever connection state or health changes.
///
/// The task ends once the provider behind `context` is gone.
pub fn spawn_badge(context: &LiveContext) -> signage_core::Result<JoinHandle<()>> {
    let mut state_rx = context.subscribe_state()?;
    let mut health_rx = context.subscribe_health()?;
    let context = context.clone();

    Ok(tokio::spawn(async move {
        loop {
            let state = *state_rx.borrow_and_update();
            let health = health_rx.borrow_and_update().clone();
            let error = context.error().ok().flatten();
            info!(target: "signage_console::badge", "{}", render_status(state, &health, error.as_deref()));

            tokio::select! {
                changed = state_rx.changed() => if changed.is_err() { break },
                changed = health_rx.changed() => if changed.is_err() { break },
            }
        }
    }))
}
