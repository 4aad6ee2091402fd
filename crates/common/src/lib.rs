pub mod config;
pub mod metrics;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, StorageBackend};
