//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `relayhub.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use std::time::Duration;

use relayhub_adapter_mqtt::MqttConfig;
use relayhub_domain::topic::DEFAULT_ROOT;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Command relay settings.
    pub relay: RelayConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// `[relay]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How long a state change waits for the device's acknowledgment.
    pub ack_timeout_ms: u64,
    /// First segment of every device topic.
    pub topic_root: String,
}

impl Config {
    /// Load configuration from `relayhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("relayhub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("RELAYHUB_HOST") {
            self.server.host = val;
        }
        if let Some(port) = lookup("RELAYHUB_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = lookup("RELAYHUB_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = lookup("RELAYHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = lookup("RELAYHUB_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = lookup("RELAYHUB_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = lookup("RELAYHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt broker_port must be non-zero".to_string(),
            ));
        }
        if self.relay.ack_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "relay ack_timeout_ms must be non-zero".to_string(),
            ));
        }
        let root = &self.relay.topic_root;
        if root.is_empty() || root.contains(['/', '+', '#']) {
            return Err(ConfigError::Validation(format!(
                "relay topic_root {root:?} must be a single non-wildcard segment"
            )));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.relay.ack_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:relayhub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "relayhubd=info,relayhub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 5_000,
            topic_root: DEFAULT_ROOT.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:relayhub.db?mode=rwc");
        assert_eq!(config.mqtt.broker_host, "localhost");
        assert_eq!(config.ack_timeout(), Duration::from_secs(5));
        assert_eq!(config.relay.topic_root, "ControlDevice");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.relay.ack_timeout_ms, 5_000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [mqtt]
            broker_host = 'broker.local'
            broker_port = 1884
            client_id = 'relay-1'

            [relay]
            ack_timeout_ms = 2500
            topic_root = 'Relays'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.mqtt.broker_host, "broker.local");
        assert_eq!(config.mqtt.broker_port, 1884);
        assert_eq!(config.mqtt.client_id, "relay-1");
        assert_eq!(config.ack_timeout(), Duration::from_millis(2500));
        assert_eq!(config.relay.topic_root, "Relays");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [relay]
            ack_timeout_ms = 1000
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ack_timeout(), Duration::from_secs(1));
        assert_eq!(config.relay.topic_root, "ControlDevice");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_environment_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("RELAYHUB_HOST", "127.0.0.1"),
            ("RELAYHUB_PORT", "8080"),
            ("RELAYHUB_DATABASE_URL", "sqlite::memory:"),
            ("RELAYHUB_MQTT_HOST", "mqtt.lan"),
            ("RELAYHUB_MQTT_PORT", "8883"),
            ("RELAYHUB_LOG", "debug"),
        ]));
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.mqtt.broker_host, "mqtt.lan");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_split_bind_override_into_host_and_port() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("RELAYHUB_BIND", "10.0.0.5:4000")]));
        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn should_prefer_rust_log_over_relayhub_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("RELAYHUB_LOG", "info"), ("RUST_LOG", "trace")]));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("RELAYHUB_PORT", "http"), ("RELAYHUB_MQTT_PORT", "-1")]));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_accept_default_configuration() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_broker_port() {
        let mut config = Config::default();
        config.mqtt.broker_port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_ack_timeout() {
        let mut config = Config::default();
        config.relay.ack_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_wildcard_topic_root() {
        let mut config = Config::default();
        config.relay.topic_root = "Control/#".to_string();
        assert!(config.validate().is_err());

        config.relay.topic_root = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }
}
