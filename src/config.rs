//! Configuration with validation at startup.

use std::time::Duration;

use clap::Args;
use secrecy::SecretString;

use crate::client::{Protocol, ProxyOptions};

/// RPC client configuration.
///
/// All values can be set via environment variables or CLI arguments.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Daemon RPC endpoint URL
    #[arg(long, env = "DAEMON_URL", default_value = "http://127.0.0.1:8112/json")]
    pub daemon_url: String,

    /// Wire protocol: json-rpc or xml-rpc
    #[arg(long, env = "RPC_PROTOCOL", default_value = "json-rpc")]
    pub protocol: String,

    /// HTTP Basic auth username
    #[arg(long, env = "RPC_USERNAME")]
    pub username: Option<String>,

    /// HTTP Basic auth password
    #[arg(long, env = "RPC_PASSWORD")]
    pub password: Option<SecretString>,

    /// Request timeout in seconds
    #[arg(long, env = "RPC_TIMEOUT", default_value = "30")]
    pub timeout_secs: u64,

    /// Recognize ISO8601 strings in replies as datetimes
    #[arg(long, env = "RPC_DECODE_DATES", default_value = "true")]
    pub decode_dates: bool,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Use JSON log format
    #[arg(long, env = "JSON_LOGS", default_value = "false")]
    pub json_logs: bool,
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("daemon URL must be http(s): {0}")]
    InvalidUrl(String),
    #[error("unknown protocol: {0}")]
    InvalidProtocol(String),
    #[error("timeout must be > 0")]
    InvalidTimeout,
    #[error("password supplied without a username")]
    PasswordWithoutUsername,
}

impl Config {
    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns the first failing [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.daemon_url.starts_with("http://") && !self.daemon_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.daemon_url.clone()));
        }
        if self.protocol.parse::<Protocol>().is_err() {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::PasswordWithoutUsername);
        }
        Ok(())
    }

    /// Get the request timeout as a Duration.
    #[inline]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build proxy options from this configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when validation fails.
    pub fn proxy_options(&self) -> Result<ProxyOptions, ConfigError> {
        self.validate()?;
        let protocol = self
            .protocol
            .parse::<Protocol>()
            .map_err(|_| ConfigError::InvalidProtocol(self.protocol.clone()))?;

        let mut options = ProxyOptions::new(self.daemon_url.clone())
            .protocol(protocol)
            .timeout(self.timeout())
            .decode_iso8601(self.decode_dates);
        if let Some(username) = &self.username {
            let password = self
                .password
                .clone()
                .unwrap_or_else(|| SecretString::from(""));
            options = options.credentials(username.clone(), password);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            daemon_url: "http://127.0.0.1:8112/json".to_string(),
            protocol: "json-rpc".to_string(),
            username: Some("web".to_string()),
            password: Some(SecretString::from("torrents")),
            timeout_secs: 30,
            decode_dates: true,
            log_level: "INFO".to_string(),
            json_logs: false,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn non_http_url_fails() {
        let mut config = test_config();
        config.daemon_url = "unix:///run/daemon.sock".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn unknown_protocol_fails() {
        let mut config = test_config();
        config.protocol = "soap".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn zero_timeout_fails() {
        let mut config = test_config();
        config.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn password_without_username_fails() {
        let mut config = test_config();
        config.username = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PasswordWithoutUsername)
        ));
    }

    #[test]
    fn proxy_options_carry_credentials() {
        let options = test_config().proxy_options().unwrap();
        assert_eq!(options.username.as_deref(), Some("web"));
        assert!(options.password.is_some());
        assert_eq!(options.timeout, Duration::from_secs(30));
    }

    #[test]
    fn proxy_options_parse_protocol() {
        let mut config = test_config();
        config.protocol = "xml".to_string();
        let options = config.proxy_options().unwrap();
        assert_eq!(options.protocol, Protocol::XmlRpc);
    }
}
