//! Server configuration.
//!
//! # Example
//!
//! ```
//! use zeta4g_bolt_server::BoltServerConfig;
//!
//! let config = BoltServerConfig::builder()
//!     .server_agent("Zeta4G/2.0.0")
//!     .inbound_queue_size(16)
//!     .build();
//! assert!(config.special_statements);
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    /// The file is not valid TOML for this config
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by every session of a server.
///
/// Missing TOML keys take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoltServerConfig {
    /// Version string for a
    /// [`StaticVersionProvider`](super::spi::StaticVersionProvider) built
    /// from this config
    pub server_agent: String,
    /// Capacity of each session's inbound command queue
    pub inbound_queue_size: usize,
    /// Route RUN "BEGIN"/"COMMIT"/"ROLLBACK" to the transaction path
    pub special_statements: bool,
    /// Log statement text on RUN
    pub log_statements: bool,
}

impl Default for BoltServerConfig {
    fn default() -> Self {
        Self {
            server_agent: "Zeta4G/1.0.0".to_string(),
            inbound_queue_size: 64,
            special_statements: true,
            log_statements: false,
        }
    }
}

impl BoltServerConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> BoltServerConfigBuilder {
        BoltServerConfigBuilder::default()
    }

    /// Check values a session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inbound_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "inbound_queue_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`BoltServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct BoltServerConfigBuilder {
    config: BoltServerConfig,
}

impl BoltServerConfigBuilder {
    /// Set the server agent string.
    pub fn server_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.server_agent = agent.into();
        self
    }

    /// Set the inbound queue capacity.
    pub fn inbound_queue_size(mut self, size: usize) -> Self {
        self.config.inbound_queue_size = size;
        self
    }

    /// Enable or disable BEGIN/COMMIT/ROLLBACK routing.
    pub fn special_statements(mut self, enabled: bool) -> Self {
        self.config.special_statements = enabled;
        self
    }

    /// Enable statement logging.
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.config.log_statements = enabled;
        self
    }

    /// Build the config.
    pub fn build(self) -> BoltServerConfig {
        self.config
    }
}

/// Load and validate a TOML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BoltServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: BoltServerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoltServerConfig::default();
        assert_eq!(config.server_agent, "Zeta4G/1.0.0");
        assert_eq!(config.inbound_queue_size, 64);
        assert!(config.special_statements);
        assert!(!config.log_statements);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BoltServerConfig::builder()
            .server_agent("Zeta4G/2.0.0")
            .inbound_queue_size(8)
            .special_statements(false)
            .log_statements(true)
            .build();
        assert_eq!(config.server_agent, "Zeta4G/2.0.0");
        assert_eq!(config.inbound_queue_size, 8);
        assert!(!config.special_statements);
        assert!(config.log_statements);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: BoltServerConfig = toml::from_str(
            r#"
            server_agent = "Zeta4G/3.1.0"
            log_statements = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server_agent, "Zeta4G/3.1.0");
        assert!(config.log_statements);
        assert_eq!(config.inbound_queue_size, 64);
        assert!(config.special_statements);
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let result: Result<BoltServerConfig, _> = toml::from_str("inbound_queue_size = \"many\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!(
            "zeta4g-bolt-server-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "inbound_queue_size = 4\nspecial_statements = false\n").unwrap();
        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.inbound_queue_size, 4);
        assert!(!config.special_statements);
    }

    #[test]
    fn test_load_config_validates() {
        let path = std::env::temp_dir().join(format!(
            "zeta4g-bolt-server-invalid-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "inbound_queue_size = 0\n").unwrap();
        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/zeta4g-bolt.toml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
