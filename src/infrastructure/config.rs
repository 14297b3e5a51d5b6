use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "taskyard.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    #[serde(default = "default_width")]
    pub width: usize,

    /// How long shutdown waits for in-flight tasks before interrupting them
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// How long shutdown waits after interrupting before abandoning workers
    #[serde(default = "default_cancel_wait_ms")]
    pub cancel_wait_ms: u64,

    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormatName,

    /// Extra `EnvFilter` directives, e.g. "taskyard=debug"
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatName {
    Pretty,
    Compact,
    Json,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            grace_period_ms: default_grace_period_ms(),
            cancel_wait_ms: default_cancel_wait_ms(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormatName::default(),
            filter: None,
        }
    }
}

impl Default for LogFormatName {
    fn default() -> Self {
        LogFormatName::Pretty
    }
}

fn default_width() -> usize { 3 }
fn default_grace_period_ms() -> u64 { 60_000 }
fn default_cancel_wait_ms() -> u64 { 1_000 }
fn default_thread_name_prefix() -> String { "taskyard-worker".to_string() }
fn default_initial_capacity() -> usize { 16 }
fn default_level() -> String { "info".to_string() }

impl PoolConfig {
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_cancel_wait(mut self, wait: Duration) -> Self {
        self.cancel_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn cancel_wait(&self) -> Duration {
        Duration::from_millis(self.cancel_wait_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Find `taskyard.toml` in the current directory or its parents
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring {}: {}", config_path.display(), e),
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.width == 0 {
            return Err(ConfigError::Invalid("pool.width must be at least 1".to_string()));
        }
        if self.pool.thread_name_prefix.is_empty() {
            return Err(ConfigError::Invalid("pool.thread_name_prefix must not be empty".to_string()));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a valid level",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pool.width, 3);
        assert_eq!(config.pool.grace_period(), Duration::from_secs(60));
        assert_eq!(config.pool.cancel_wait(), Duration::from_secs(1));
        assert_eq!(config.cache.initial_capacity, 16);
        assert_eq!(config.logging.format, LogFormatName::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::parse(
            r#"
            [pool]
            width = 8
            grace_period_ms = 250

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.width, 8);
        assert_eq!(config.pool.grace_period(), Duration::from_millis(250));
        assert_eq!(config.pool.cancel_wait_ms, 1_000);
        assert_eq!(config.logging.format, LogFormatName::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::parse("[pool]\nwidth = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[logging]\nlevel = \"loud\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(Config::parse("[pool\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[pool]\nwidth = 2\nthread_name_prefix = \"files\"").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.pool.width, 2);
        assert_eq!(config.pool.thread_name_prefix, "files");

        let missing = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
