//! Signage Persistence - in-memory event history window

pub mod cache;

pub use cache::{EventHistory, DEFAULT_HISTORY_CAPACITY};
