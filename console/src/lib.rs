//! Signage Console - host for the live-update core

pub mod badge;
pub mod notifications;
pub mod settings;
