//! Configuration management for id-token-generator
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `IDTOKEN_*` environment variables, then command-line flags. The merged
//! result is validated before any network call is made.

use crate::cli::Cli;
use crate::error::{IdTokenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
///
/// Everything the `generate` command needs to run one authentication flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OpenID Connect issuer base URL
    pub issuer: String,

    /// OpenID Connect client identifier of the Relying Party
    pub client_id: String,

    /// Additional scopes, requested after `openid`
    pub scopes: Vec<String>,

    /// Local callback listener settings
    pub listener: ListenerConfig,

    /// File receiving the token; stdout when `None`
    pub outfile: Option<PathBuf>,

    /// Upper bound on the wait for the redirect, in seconds
    pub timeout_seconds: Option<u64>,

    /// Explicit `state` value; a random one is generated when `None`
    pub state: Option<String>,

    /// Reject callbacks whose `state` does not match
    pub verify_state: bool,

    /// Launch the system browser with the authorization URL
    pub open_browser: bool,

    /// Diagnostic logging
    pub verbose: bool,
}

/// Callback listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Local HTTPS port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path segment receiving the redirect POST
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// PEM file with the certificate chain and private key
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,

    /// Poll interval of the server in seconds; also bounds the shutdown grace period
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_port() -> u16 {
    4553
}

fn default_endpoint() -> String {
    "callback".to_string()
}

fn default_key_path() -> PathBuf {
    PathBuf::from("cert").join("server.pem")
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            endpoint: default_endpoint(),
            key_path: default_key_path(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl ListenerConfig {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            client_id: String::new(),
            scopes: Vec::new(),
            listener: ListenerConfig::default(),
            outfile: None,
            timeout_seconds: None,
            state: None,
            verify_state: false,
            open_browser: true,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration with file, environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to a YAML configuration file
    /// * `cli` - Parsed command line, applied last
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: Option<&str>, cli: &Cli) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(IdTokenError::Config(format!("Config file not found: {}", path)).into());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IdTokenError::Config(format!("Failed to read config file: {}", e)))?;
        tracing::debug!("Loaded configuration from {}", path);
        serde_yaml::from_str(&contents)
            .map_err(|e| IdTokenError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(port) = std::env::var("IDTOKEN_PORT") {
            if let Ok(value) = port.parse() {
                self.listener.port = value;
            } else {
                tracing::warn!("Invalid IDTOKEN_PORT: {}", port);
            }
        }

        if let Ok(endpoint) = std::env::var("IDTOKEN_ENDPOINT") {
            self.listener.endpoint = endpoint;
        }

        if let Ok(key) = std::env::var("IDTOKEN_KEY") {
            self.listener.key_path = PathBuf::from(key);
        }

        if let Ok(outfile) = std::env::var("IDTOKEN_OUTFILE") {
            self.outfile = Some(PathBuf::from(outfile));
        }

        if let Ok(interval) = std::env::var("IDTOKEN_POLL_INTERVAL") {
            if let Ok(value) = interval.parse() {
                self.listener.poll_interval_seconds = value;
            } else {
                tracing::warn!("Invalid IDTOKEN_POLL_INTERVAL: {}", interval);
            }
        }

        if let Ok(timeout) = std::env::var("IDTOKEN_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.timeout_seconds = Some(value);
            } else {
                tracing::warn!("Invalid IDTOKEN_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        self.issuer = cli.issuer.clone();
        self.client_id = cli.client_id.clone();

        if let Some(port) = cli.port {
            self.listener.port = port;
        }
        if let Some(endpoint) = &cli.endpoint {
            self.listener.endpoint = endpoint.clone();
        }
        if let Some(key) = &cli.key {
            self.listener.key_path = key.clone();
        }
        if let Some(interval) = cli.poll_interval {
            self.listener.poll_interval_seconds = interval;
        }
        if let Some(outfile) = &cli.outfile {
            self.outfile = Some(outfile.clone());
        }
        if let Some(timeout) = cli.timeout {
            self.timeout_seconds = Some(timeout);
        }
        if let Some(state) = &cli.state {
            self.state = Some(state.clone());
        }
        if !cli.scopes.is_empty() {
            self.scopes.extend(cli.scopes.iter().cloned());
        }
        if cli.verify_state {
            self.verify_state = true;
        }
        if cli.no_browser {
            self.open_browser = false;
        }
        if cli.verbose {
            self.verbose = true;
        }
    }

    /// Endpoint path segment without surrounding slashes
    pub fn endpoint_segment(&self) -> &str {
        self.listener.endpoint.trim_matches('/')
    }

    /// Optional wait bound as a [`Duration`]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::Config`] describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        let issuer = url::Url::parse(&self.issuer)
            .map_err(|e| IdTokenError::Config(format!("Invalid issuer URL {}: {}", self.issuer, e)))?;
        if !matches!(issuer.scheme(), "https" | "http") {
            return Err(IdTokenError::Config(format!(
                "Issuer must be an http(s) URL, got scheme {}",
                issuer.scheme()
            ))
            .into());
        }

        if self.client_id.trim().is_empty() {
            return Err(IdTokenError::Config("client_id cannot be empty".to_string()).into());
        }

        let endpoint = self.endpoint_segment();
        if endpoint.is_empty() {
            return Err(IdTokenError::Config("endpoint cannot be empty".to_string()).into());
        }
        if endpoint
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '?' | '#' | '/' | '%'))
        {
            return Err(IdTokenError::Config(format!(
                "endpoint must be a single path segment, got {}",
                self.listener.endpoint
            ))
            .into());
        }

        if self.listener.poll_interval_seconds == 0 {
            return Err(IdTokenError::Config(
                "poll_interval must be greater than 0".to_string(),
            )
            .into());
        }

        if self.timeout_seconds == Some(0) {
            return Err(
                IdTokenError::Config("timeout must be greater than 0".to_string()).into(),
            );
        }

        if let Some(state) = &self.state {
            if state.is_empty() {
                return Err(IdTokenError::Config("state cannot be empty".to_string()).into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    fn cli(args: &[&str]) -> Cli {
        // positionals first: `--scopes` takes every value that follows it
        let mut argv = vec!["id-token-generator", "https://issuer.example.com", "client-123"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn clear_env() {
        for key in [
            "IDTOKEN_PORT",
            "IDTOKEN_ENDPOINT",
            "IDTOKEN_KEY",
            "IDTOKEN_OUTFILE",
            "IDTOKEN_POLL_INTERVAL",
            "IDTOKEN_TIMEOUT_SECONDS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_match_documented_values() {
        clear_env();
        let config = Config::load(None, &cli(&[])).unwrap();
        assert_eq!(config.listener.port, 4553);
        assert_eq!(config.listener.endpoint, "callback");
        assert_eq!(config.listener.key_path, PathBuf::from("cert/server.pem"));
        assert_eq!(config.listener.poll_interval_seconds, 1);
        assert!(config.outfile.is_none());
        assert!(config.scopes.is_empty());
        assert!(config.timeout_seconds.is_none());
        assert!(config.open_browser);
        assert!(!config.verify_state);
        assert!(!config.verbose);
        assert_eq!(config.issuer, "https://issuer.example.com");
        assert_eq!(config.client_id, "client-123");
    }

    #[test]
    #[serial]
    fn test_cli_overrides_defaults() {
        clear_env();
        let config = Config::load(
            None,
            &cli(&["-p", "9000", "-e", "cb", "--no-browser", "-s", "email"]),
        )
        .unwrap();
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.endpoint, "cb");
        assert!(!config.open_browser);
        assert_eq!(config.scopes, vec!["email".to_string()]);
    }

    #[test]
    #[serial]
    fn test_env_vars_override_defaults_but_not_cli() {
        clear_env();
        std::env::set_var("IDTOKEN_PORT", "7000");
        std::env::set_var("IDTOKEN_ENDPOINT", "from-env");
        std::env::set_var("IDTOKEN_TIMEOUT_SECONDS", "45");

        let config = Config::load(None, &cli(&["--endpoint", "from-cli"])).unwrap();
        clear_env();

        assert_eq!(config.listener.port, 7000);
        assert_eq!(config.listener.endpoint, "from-cli");
        assert_eq!(config.timeout_seconds, Some(45));
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_ignored() {
        clear_env();
        std::env::set_var("IDTOKEN_PORT", "not-a-port");
        let config = Config::load(None, &cli(&[])).unwrap();
        clear_env();
        assert_eq!(config.listener.port, 4553);
    }

    #[test]
    #[serial]
    fn test_config_from_yaml() {
        clear_env();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
scopes:
  - profile
listener:
  port: 8443
  key_path: /etc/idtoken/server.pem
timeout_seconds: 90
verify_state: true
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap()), &cli(&["-s", "email"])).unwrap();
        assert_eq!(config.listener.port, 8443);
        assert_eq!(config.listener.endpoint, "callback");
        assert_eq!(
            config.listener.key_path,
            PathBuf::from("/etc/idtoken/server.pem")
        );
        assert_eq!(config.timeout_seconds, Some(90));
        assert!(config.verify_state);
        assert_eq!(
            config.scopes,
            vec!["profile".to_string(), "email".to_string()]
        );
    }

    #[test]
    #[serial]
    fn test_verbose_comes_from_file_or_flag() {
        clear_env();
        let config = Config::load(None, &cli(&["-v"])).unwrap();
        assert!(config.verbose);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "verbose: true\n").unwrap();
        let config = Config::load(Some(path.to_str().unwrap()), &cli(&[])).unwrap();
        assert!(config.verbose);
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_an_error() {
        clear_env();
        let result = Config::load(Some("/nonexistent/idtoken.yaml"), &cli(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_success() {
        let config = Config {
            issuer: "https://issuer.example.com".to_string(),
            client_id: "abc".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_issuer() {
        let config = Config {
            issuer: "not a url".to_string(),
            client_id: "abc".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            issuer: "ftp://issuer.example.com".to_string(),
            client_id: "abc".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_client_id() {
        let config = Config {
            issuer: "https://issuer.example.com".to_string(),
            client_id: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_multi_segment_endpoint() {
        let mut config = Config {
            issuer: "https://issuer.example.com".to_string(),
            client_id: "abc".to_string(),
            ..Config::default()
        };
        config.listener.endpoint = "a/b".to_string();
        assert!(config.validate().is_err());

        config.listener.endpoint = "/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_segment_strips_slashes() {
        let mut config = Config::default();
        config.listener.endpoint = "/callback/".to_string();
        assert_eq!(config.endpoint_segment(), "callback");
    }

    #[test]
    fn test_validation_rejects_zero_intervals() {
        let mut config = Config {
            issuer: "https://issuer.example.com".to_string(),
            client_id: "abc".to_string(),
            ..Config::default()
        };
        config.listener.poll_interval_seconds = 0;
        assert!(config.validate().is_err());

        config.listener.poll_interval_seconds = 1;
        config.timeout_seconds = Some(0);
        assert!(config.validate().is_err());
    }
}
