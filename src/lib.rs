pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod gpu;
pub mod host;
pub mod interop;
pub mod queue;
pub mod ticker;
pub mod view;

pub use crate::core::HudCore;
pub use config::CoreConfig;
pub use errors::CoreError;
pub use view::ViewId;
