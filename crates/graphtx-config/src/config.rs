//! Client configuration: endpoint, credentials and HTTP settings
//!
//! # File Format
//!
//! ```toml
//! base_url = "http://localhost:7474/db/data"
//! timeout_secs = 30
//! stream_results = true
//!
//! [credentials]
//! username = "neo4j"
//! password = "secret"
//! ```
//!
//! # Resolution Priority
//!
//! 1. Environment variables (`GRAPHTX_URL`, `GRAPHTX_USERNAME`, `GRAPHTX_PASSWORD`,
//!    `GRAPHTX_TIMEOUT_SECS`)
//! 2. Config file values
//! 3. Built-in defaults

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_URL: &str = "GRAPHTX_URL";
pub const ENV_USERNAME: &str = "GRAPHTX_USERNAME";
pub const ENV_PASSWORD: &str = "GRAPHTX_PASSWORD";
pub const ENV_TIMEOUT_SECS: &str = "GRAPHTX_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:7474/db/data";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const REDACTED: &str = "********";

/// Basic auth credentials applied to every request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Configuration for the graph HTTP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `http://localhost:7474/db/data`
    pub base_url: String,
    /// Basic auth credentials, if the server requires them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Send `X-Stream: true` so the server streams responses
    pub stream_results: bool,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stream_results: true,
            user_agent: format!("graphtx/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that the configuration can be used to build a client
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::invalid("base_url", "must not be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "base_url",
                format!("'{}' must start with http:// or https://", url),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout_secs", "must be greater than zero"));
        }
        if let Some(credentials) = &self.credentials {
            if credentials.username.trim().is_empty() {
                return Err(ConfigError::invalid("credentials.username", "must not be empty"));
            }
        }
        Ok(())
    }

    /// Copy with the password masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(credentials) = copy.credentials.as_mut() {
            if !credentials.password.is_empty() {
                credentials.password = REDACTED.to_string();
            }
        }
        copy
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored. A password without a username only applies
    /// when credentials are already configured.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(url) = get(ENV_URL) {
            debug!("Using base URL from {}", ENV_URL);
            self.base_url = url;
        }

        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw.trim().parse().map_err(|_| {
                ConfigError::invalid(
                    "timeout_secs",
                    format!("{}='{}' is not a number", ENV_TIMEOUT_SECS, raw),
                )
            })?;
            debug!("Using timeout from {}", ENV_TIMEOUT_SECS);
        }

        let password = get(ENV_PASSWORD);
        if let Some(username) = get(ENV_USERNAME) {
            debug!("Using credentials from {}", ENV_USERNAME);
            let password = password
                .or_else(|| self.credentials.take().map(|c| c.password))
                .unwrap_or_default();
            self.credentials = Some(Credentials { username, password });
        } else if let Some(password) = password {
            match self.credentials.as_mut() {
                Some(credentials) => {
                    debug!("Using password from {}", ENV_PASSWORD);
                    credentials.password = password;
                }
                None => warn!(
                    "{} is set but no username is configured; ignoring it",
                    ENV_PASSWORD
                ),
            }
        }

        Ok(())
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    credentials: Option<Credentials>,
    timeout_secs: Option<u64>,
    stream_results: Option<bool>,
    user_agent: Option<String>,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set basic auth credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Enable or disable the `X-Stream` header
    pub fn stream_results(mut self, stream: bool) -> Self {
        self.stream_results = Some(stream);
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client configuration
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            credentials: self.credentials.or(defaults.credentials),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            stream_results: self.stream_results.unwrap_or(defaults.stream_results),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_server() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:7474/db/data");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.stream_results);
        assert!(config.credentials.is_none());
        assert!(config.user_agent.starts_with("graphtx/"));
        config.validate().unwrap();
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ClientConfig::builder()
            .base_url("https://graph.example.com/db/data")
            .credentials("neo4j", "secret")
            .timeout(Duration::from_secs(5))
            .stream_results(false)
            .build();

        assert_eq!(config.base_url, "https://graph.example.com/db/data");
        assert_eq!(config.timeout_secs, 5);
        assert!(!config.stream_results);
        assert_eq!(config.credentials.unwrap().username, "neo4j");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_scheme = ClientConfig::builder().base_url("ftp://host").build();
        assert!(matches!(
            bad_scheme.validate(),
            Err(ConfigError::Invalid { field: "base_url", .. })
        ));

        let zero_timeout = ClientConfig {
            timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            zero_timeout.validate(),
            Err(ConfigError::Invalid { field: "timeout_secs", .. })
        ));

        let blank_user = ClientConfig::builder().credentials(" ", "pw").build();
        assert!(blank_user.validate().is_err());
    }

    #[test]
    fn password_never_shows_in_debug_or_redacted_copy() {
        let config = ClientConfig::builder().credentials("neo4j", "hunter2").build();

        assert!(!format!("{:?}", config).contains("hunter2"));
        let redacted = config.redacted();
        assert_eq!(redacted.credentials.as_ref().unwrap().password, REDACTED);
        assert_eq!(config.credentials.unwrap().password, "hunter2");
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = ClientConfig::builder()
            .base_url("http://file-host:7474/db/data")
            .credentials("file-user", "file-pw")
            .build();

        config
            .apply_overrides_from(lookup(&[
                (ENV_URL, "http://env-host:7474/db/data"),
                (ENV_USERNAME, "env-user"),
                (ENV_TIMEOUT_SECS, "9"),
            ]))
            .unwrap();

        assert_eq!(config.base_url, "http://env-host:7474/db/data");
        assert_eq!(config.timeout_secs, 9);
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.username, "env-user");
        // password falls back to the file value
        assert_eq!(credentials.password, "file-pw");
    }

    #[test]
    fn password_override_needs_a_username() {
        let mut anonymous = ClientConfig::default();
        anonymous
            .apply_overrides_from(lookup(&[(ENV_PASSWORD, "pw")]))
            .unwrap();
        assert!(anonymous.credentials.is_none());

        let mut configured = ClientConfig::builder().credentials("neo4j", "old").build();
        configured
            .apply_overrides_from(lookup(&[(ENV_PASSWORD, "new")]))
            .unwrap();
        assert_eq!(configured.credentials.unwrap().password, "new");
    }

    #[test]
    fn empty_override_values_are_ignored() {
        let mut config = ClientConfig::default();
        config
            .apply_overrides_from(lookup(&[(ENV_URL, ""), (ENV_USERNAME, "")]))
            .unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn non_numeric_timeout_is_invalid() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_overrides_from(lookup(&[(ENV_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "timeout_secs", .. }));
    }

    #[test]
    #[serial]
    fn process_environment_is_read() {
        std::env::set_var(ENV_URL, "http://from-env:7474/db/data");
        std::env::remove_var(ENV_USERNAME);
        std::env::remove_var(ENV_PASSWORD);
        std::env::remove_var(ENV_TIMEOUT_SECS);

        let mut config = ClientConfig::default();
        let result = config.apply_env_overrides();
        std::env::remove_var(ENV_URL);

        result.unwrap();
        assert_eq!(config.base_url, "http://from-env:7474/db/data");
    }
}
