//! Countdown Keeper - A countdown timer service grouped by category
//! 
//! This library owns a collection of named countdown timers, ticks the
//! running ones once per second, records every completion into a history
//! log, and persists both collections through a key-value store.

pub mod config;
pub mod error;
pub mod store;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ValidationError};
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
