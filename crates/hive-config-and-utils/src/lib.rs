//! Core configuration, paths, and utilities shared by the HiveBooks client crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, RetrySettings, DEFAULT_API_URL, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
