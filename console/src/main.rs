//! Signage Console - Main entry point

use anyhow::Context;
use signage_console::badge::spawn_badge;
use signage_console::notifications::NotificationHandle;
use signage_console::settings;
use signage_engine::LiveProvider;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage_console=info,signage_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting signage console");

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = settings::load(settings_path.as_deref())?;
    let auto_connect = settings.live.auto_connect;

    let provider =
        LiveProvider::from_config(settings.live).context("failed to set up live connection")?;
    let context = provider.context();

    let notifications = NotificationHandle::new(settings.notifications);
    let _subscriptions = notifications
        .attach(&context)
        .context("failed to subscribe notifications")?;
    let badge = spawn_badge(&context).context("failed to start connection badge")?;

    // the console is the only consumer, so it opens the stream itself
    if !auto_connect {
        context.connect()?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    provider.shutdown();
    if let Err(e) = badge.await {
        tracing::warn!("Badge task ended abnormally: {}", e);
    }

    Ok(())
}
