//! Signage Core - Shared event models, state types, configuration, and errors

pub mod config;
pub mod errors;
pub mod models;
pub mod types;

pub use config::{LiveConfig, EVENTS_PATH};
pub use errors::{Error, Result};
pub use models::*;
pub use types::*;
