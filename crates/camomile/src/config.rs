//! Process configuration: the `Configuration` entity of `spec.md` §3, loaded
//! either programmatically via [`ConfigBuilder`] or from the process
//! environment for the standalone binary.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

const DEFAULT_MAX_SIZE: u64 = 104_857_600;
const DEFAULT_SERVER_NAME: &str = "camomile";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TOTAL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BIND: &str = "127.0.0.1:8081";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Expected `secret` in options")]
    MissingSecret,
}

/// Validated process configuration (`spec.md` §3's `Configuration` entity).
#[derive(Clone)]
pub struct Config {
    pub secret: Vec<u8>,
    pub max_size: Option<u64>,
    pub server_name: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
    pub bind: String,
    pub shutdown: CancellationToken,
    /// Disables SSRF unicast enforcement. Always `false` in production; set
    /// only to drive the proxy against a loopback `wiremock` server in tests.
    pub allow_private_targets: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Loads configuration from `CAMOMILE_*` environment variables, falling
    /// back to the same defaults as [`ConfigBuilder`].
    ///
    /// `CAMOMILE_HMAC_SECRET` is required; every other variable is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        let secret = std::env::var("CAMOMILE_HMAC_SECRET").map_err(|_| ConfigError::MissingSecret)?;
        builder = builder.secret(secret.into_bytes());

        if let Ok(max_size) = std::env::var("CAMOMILE_MAX_SIZE") {
            match max_size.parse::<u64>() {
                Ok(value) => builder = builder.max_size(value),
                Err(_) => tracing::warn!(value = %max_size, "ignoring unparseable CAMOMILE_MAX_SIZE"),
            }
        }

        if let Ok(server_name) = std::env::var("CAMOMILE_SERVER_NAME") {
            builder = builder.server_name(server_name);
        }

        if let Ok(bind) = std::env::var("CAMOMILE_BIND") {
            builder = builder.bind(bind);
        }

        if let Ok(timeout) = std::env::var("CAMOMILE_FETCH_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => builder = builder.total_timeout(Duration::from_secs(secs)),
                Err(_) => tracing::warn!(value = %timeout, "ignoring unparseable CAMOMILE_FETCH_TIMEOUT_SECS"),
            }
        }

        if let Ok(flag) = std::env::var("CAMOMILE_ALLOW_PRIVATE_TARGETS") {
            if flag == "1" || flag.eq_ignore_ascii_case("true") {
                tracing::warn!("CAMOMILE_ALLOW_PRIVATE_TARGETS is set, SSRF protection is disabled");
                builder = builder.allow_private_targets(true);
            }
        }

        builder.build()
    }
}

/// Fallible builder for [`Config`], in the style of the engine's
/// `ServerBuilder` (every knob optional except the signing secret).
#[derive(Default)]
pub struct ConfigBuilder {
    secret: Option<Vec<u8>>,
    max_size: Option<u64>,
    server_name: Option<String>,
    connect_timeout: Option<Duration>,
    total_timeout: Option<Duration>,
    bind: Option<String>,
    shutdown: Option<CancellationToken>,
    allow_private_targets: bool,
}

impl ConfigBuilder {
    pub fn secret(mut self, secret: Vec<u8>) -> Self {
        self.secret = Some(secret);
        self
    }

    /// `None` disables the size cap entirely; omit this call to use the
    /// 100 MiB default.
    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    pub fn shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Disables SSRF unicast enforcement. Never call this outside tests.
    pub fn allow_private_targets(mut self, allow: bool) -> Self {
        self.allow_private_targets = allow;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let secret = self.secret.filter(|s| !s.is_empty()).ok_or(ConfigError::MissingSecret)?;

        Ok(Config {
            secret,
            max_size: Some(self.max_size.unwrap_or(DEFAULT_MAX_SIZE)),
            server_name: self.server_name.unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)),
            total_timeout: self.total_timeout.unwrap_or(Duration::from_secs(DEFAULT_TOTAL_TIMEOUT_SECS)),
            bind: self.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
            shutdown: self.shutdown.unwrap_or_default(),
            allow_private_targets: self.allow_private_targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_fails_with_exact_message() {
        let err = Config::builder().build().unwrap_err();
        assert_eq!(err.to_string(), "Expected `secret` in options");
    }

    #[test]
    fn empty_secret_is_treated_as_missing() {
        let err = Config::builder().secret(Vec::new()).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret);
    }

    #[test]
    fn defaults_are_applied() {
        let config = Config::builder().secret(b"s".to_vec()).build().unwrap();
        assert_eq!(config.max_size, Some(DEFAULT_MAX_SIZE));
        assert_eq!(config.server_name, "camomile");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.total_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_take_effect() {
        let config = Config::builder().secret(b"s".to_vec()).max_size(2048).server_name("proxy").bind("0.0.0.0:9000").build().unwrap();
        assert_eq!(config.max_size, Some(2048));
        assert_eq!(config.server_name, "proxy");
        assert_eq!(config.bind, "0.0.0.0:9000");
    }
}
