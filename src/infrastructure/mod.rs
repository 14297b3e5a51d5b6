//! Ambient infrastructure: configuration, logging, metrics

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{CacheConfig, Config, LogFormatName, LoggingConfig, PoolConfig};
pub use logging::{init_dev_logging, init_logging, init_prod_logging, LogConfig, LogFormat, LogOutput};
pub use metrics::{MetricsSnapshot, PoolMetrics};
