//! Infrastructure layer module
//!
//! Process-level concerns that sit outside the adapters:
//! - Configuration management
//! - Logging infrastructure
//! - Project initialization

pub mod config;
pub mod logging;
pub mod setup;

pub use config::{ConfigError, ConfigLoader};
pub use logging::LoggerImpl;
