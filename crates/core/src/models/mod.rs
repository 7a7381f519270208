//! Data models for live signage events

mod display;
mod event;
mod slideshow;
mod system;

pub use display::*;
pub use event::*;
pub use slideshow::*;
pub use system::*;
